//! Telemetry server with an XOR cipher on encryption flag 1.
//!
//! Builds a protocol in code, serves it on an ephemeral port, sends a few
//! frames from a client thread and prints what the handler sees.
//!
//! Run with:
//!   cargo run --example telemetry-server

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use rotcp::codec::{Affine, ByteOrder, Codec, ExplainedValue, FieldSpec, Interpretation};
use rotcp::dispatch::{BoxError, Cipher, FunctionHandler, Protocol, ProtocolServer};
use rotcp::frame::{ElementDescriptor, FrameConfig, FrameSchema};
use rotcp::transport::TcpTransport;

const BE: ByteOrder = ByteOrder::BigEndian;

struct Xor(u8);

impl Cipher for Xor {
    fn name(&self) -> &str {
        "xor"
    }

    fn decrypt(&self, payload: Bytes) -> Result<Bytes, BoxError> {
        Ok(payload.iter().map(|b| b ^ self.0).collect::<Vec<_>>().into())
    }

    fn encrypt(&self, payload: Bytes) -> Result<Bytes, BoxError> {
        self.decrypt(payload)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let schema = FrameSchema::new(vec![
        ElementDescriptor::preamble(vec![0x68]),
        ElementDescriptor::length(1, BE),
        ElementDescriptor::encryption_flag(1, BE),
        ElementDescriptor::function_code(1, BE),
        ElementDescriptor::payload(),
        ElementDescriptor::checksum(2, 0, ByteOrder::LittleEndian),
    ])?;

    let telemetry = FunctionHandler::new(
        0x01,
        "telemetry",
        vec![
            FieldSpec::new(
                "voltage",
                Codec::Binary(BE),
                Interpretation::float(Affine {
                    multiply_first: true,
                    multiple: 0.1,
                    offset: 0.0,
                }),
                2,
            )?,
            FieldSpec::new(
                "state",
                Codec::Binary(BE),
                Interpretation::default().with_enum("unknown", [(0, "idle"), (1, "charging")]),
                1,
            )?,
        ],
    )?
    .on_message(|fields| {
        eprintln!(
            "voltage={} state={}",
            fields["voltage"].explained, fields["state"].explained
        );
        Ok(())
    });

    let protocol = Arc::new(
        Protocol::builder(schema)
            .name("telemetry")
            .cipher(1, Xor(0x5A))
            .handler(telemetry)
            .build()?,
    );

    let server = ProtocolServer::bind("127.0.0.1:0", Arc::clone(&protocol))?;
    let addr = server.local_addr();
    let handle = server.handle();
    eprintln!("Listening on {addr}");
    let server_thread = thread::spawn(move || server.run());

    let stream = TcpTransport::connect(addr)?;
    let mut writer = protocol.writer(stream, FrameConfig::default());
    for (flag, volts, state) in [(0, 229.5, "idle"), (1, 231.0, "charging")] {
        let values = HashMap::from([
            ("voltage".to_string(), ExplainedValue::Float(volts)),
            ("state".to_string(), ExplainedValue::Enum(state.to_string())),
        ]);
        writer.write_frame(&protocol.outgoing(0x01, flag, 0, &values)?)?;
    }
    writer.flush()?;

    thread::sleep(Duration::from_millis(200));
    handle.stop();
    server_thread.join().map_err(|_| "server thread panicked")??;
    Ok(())
}
