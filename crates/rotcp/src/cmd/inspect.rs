use crate::cmd::{load_definition, InspectArgs};
use crate::exit::{definition_error, CliResult, SUCCESS};
use crate::output::{print_definition, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let definition = load_definition(&args.protocol)?;
    // Compiling catches field and handler errors the schema alone does not.
    let protocol = definition
        .build()
        .map_err(|err| definition_error("invalid protocol file", err))?;
    print_definition(&definition, protocol.schema(), format);
    Ok(SUCCESS)
}
