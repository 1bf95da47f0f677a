use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use rotcp::dispatch::{BoxError, ParsedFields, ProtocolServer, ServeConfig, ServerHandle};
use rotcp::frame::FrameConfig;
use tracing::info;

use crate::cmd::{load_definition, parse_duration, ServeArgs};
use crate::exit::{definition_error, dispatch_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, MessageView, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let definition = load_definition(&args.protocol)?;

    let printed = Arc::new(AtomicU64::new(0));
    let stopper: Arc<OnceLock<ServerHandle>> = Arc::new(OnceLock::new());
    let limit = args.count;

    let protocol = definition
        .compile(|function| {
            let code = function.code;
            let name = function.name.clone();
            let order: Vec<String> = function.fields.iter().map(|f| f.name.clone()).collect();
            let printed = Arc::clone(&printed);
            let stopper = Arc::clone(&stopper);
            move |fields: &ParsedFields| -> Result<(), BoxError> {
                print_message(
                    &MessageView {
                        function_code: code,
                        handler: &name,
                        serial_number: None,
                        order: &order,
                        fields,
                    },
                    format,
                );
                let seen = printed.fetch_add(1, Ordering::SeqCst) + 1;
                if limit.is_some_and(|limit| seen >= limit) {
                    if let Some(handle) = stopper.get() {
                        handle.stop();
                    }
                }
                Ok(())
            }
        })
        .map_err(|err| definition_error("invalid protocol file", err))?;

    let mut frame = FrameConfig::default();
    if let Some(max) = args.max_payload {
        frame.max_payload_size = max;
    }
    if let Some(timeout) = &args.read_timeout {
        frame.read_timeout = Some(parse_duration(timeout)?);
    }
    let config = ServeConfig {
        frame,
        error_policy: args.policy.into(),
        max_frames: None,
    };

    let server = ProtocolServer::bind(args.addr.as_str(), Arc::new(protocol))
        .map_err(|err| dispatch_error("bind failed", err))?
        .with_config(config);
    let handle = server.handle();
    let _ = stopper.set(handle.clone());
    install_ctrlc_handler(handle)?;

    info!(
        protocol = %definition.name,
        addr = %server.local_addr(),
        "listening"
    );
    server
        .run()
        .map_err(|err| dispatch_error("server failed", err))?;

    Ok(SUCCESS)
}

fn install_ctrlc_handler(handle: ServerHandle) -> CliResult<()> {
    ctrlc::set_handler(move || handle.stop())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
