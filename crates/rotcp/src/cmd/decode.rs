use std::io::Cursor;
use std::sync::Arc;

use rotcp::dispatch::FrameParser;

use crate::cmd::{load_definition, DecodeArgs};
use crate::exit::{
    definition_error, dispatch_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE,
};
use crate::output::{print_message, MessageView, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let definition = load_definition(&args.protocol)?;
    let protocol = definition
        .build()
        .map_err(|err| definition_error("invalid protocol file", err))?;
    let input = read_input(&args)?;

    let mut parser = FrameParser::new(Cursor::new(input), Arc::new(protocol));
    loop {
        let message = match parser.process_next() {
            Ok(message) => message,
            Err(err) if err.is_connection_closed() => break,
            Err(err) => return Err(dispatch_error("decode failed", err)),
        };
        let order: Vec<String> = parser
            .protocol()
            .handlers()
            .get(message.function_code)
            .map(|handler| handler.fields().iter().map(|f| f.name().to_string()).collect())
            .unwrap_or_default();
        print_message(
            &MessageView {
                function_code: message.function_code,
                handler: &message.handler,
                serial_number: message.serial_number,
                order: &order,
                fields: &message.fields,
            },
            format,
        );
    }

    let pending = parser.reader().pending();
    if pending > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("decode failed: input ends inside a frame ({pending} bytes pending)"),
        ));
    }
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if let Some(text) = &args.hex {
        let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        return hex::decode(digits)
            .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")));
    }
    if let Some(path) = &args.file {
        return std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Err(CliError::new(USAGE, "either --hex or --file is required"))
}
