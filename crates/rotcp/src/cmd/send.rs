use bytes::BytesMut;
use rotcp::definition::values_from_json;
use rotcp::frame::{encode_frame, FrameConfig};
use rotcp::transport::TcpTransport;
use serde::Serialize;
use tracing::debug;

use crate::cmd::{load_definition, parse_duration, SendArgs};
use crate::exit::{
    definition_error, dispatch_error, frame_error, transport_error, CliError, CliResult, SUCCESS,
    USAGE,
};
use crate::output::{print_hex, OutputFormat};

#[derive(Serialize)]
struct SendOutput<'a> {
    addr: &'a str,
    function_code: u64,
    bytes: usize,
    frame: String,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let definition = load_definition(&args.protocol)?;
    let protocol = definition
        .build()
        .map_err(|err| definition_error("invalid protocol file", err))?;

    let json: serde_json::Value = serde_json::from_str(&args.values)
        .map_err(|err| CliError::new(USAGE, format!("--values is not valid JSON: {err}")))?;
    let values = values_from_json(&protocol, args.code, &json)
        .map_err(|err| definition_error("invalid values", err))?;
    let outgoing = protocol
        .outgoing(args.code, args.flag, args.serial, &values)
        .map_err(|err| dispatch_error("encode failed", err))?;
    let mut wire = BytesMut::new();
    encode_frame(protocol.schema(), protocol.checksums(), &outgoing, &mut wire)
        .map_err(|err| frame_error("encode failed", err))?;

    let addr = match (&args.addr, args.dry_run) {
        (Some(addr), false) => addr,
        _ => {
            print_hex(&wire);
            return Ok(SUCCESS);
        }
    };

    let timeout = parse_duration(&args.timeout)?;
    let stream = TcpTransport::connect(addr.as_str())
        .map_err(|err| transport_error("connect failed", err))?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(|err| transport_error("connect failed", err))?;
    let mut writer = protocol.writer(stream, FrameConfig::default());
    writer
        .write_frame(&outgoing)
        .map_err(|err| frame_error("send failed", err))?;
    writer
        .flush()
        .map_err(|err| frame_error("send failed", err))?;
    debug!(addr = %addr, bytes = wire.len(), "frame sent");

    match format {
        OutputFormat::Json => {
            let out = SendOutput {
                addr: addr.as_str(),
                function_code: args.code,
                bytes: wire.len(),
                frame: hex::encode(&wire),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Raw => print_hex(&wire),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("sent {} bytes to {addr}: {}", wire.len(), hex::encode(&wire));
        }
    }
    Ok(SUCCESS)
}
