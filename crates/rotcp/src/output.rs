use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rotcp::definition::{explained_to_json, parsed_to_json, ProtocolDefinition};
use rotcp::dispatch::ParsedFields;
use rotcp::frame::{ElementLength, FrameSchema};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One decoded message, ready for printing.
pub struct MessageView<'a> {
    pub function_code: u64,
    pub handler: &'a str,
    pub serial_number: Option<u64>,
    /// Field names in payload order.
    pub order: &'a [String],
    pub fields: &'a ParsedFields,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    function_code: u64,
    handler: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_number: Option<u64>,
    fields: Map<String, Value>,
    timestamp: String,
}

pub fn print_message(message: &MessageView<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let fields = message
                .order
                .iter()
                .filter_map(|name| {
                    message
                        .fields
                        .get(name)
                        .map(|value| (name.clone(), parsed_to_json(value)))
                })
                .collect();
            let out = MessageOutput {
                function_code: message.function_code,
                handler: message.handler,
                serial_number: message.serial_number,
                fields,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "RAW", "RAW VALUE", "VALUE"]);
            for name in message.order {
                if let Some(value) = message.fields.get(name) {
                    table.add_row(vec![
                        name.clone(),
                        hex::encode(&value.raw_bytes),
                        value.raw_value.to_string(),
                        value.explained.to_string(),
                    ]);
                }
            }
            println!(
                "function {:#04x} ({}){}",
                message.function_code,
                message.handler,
                serial_suffix(message.serial_number)
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let values: Vec<String> = message
                .order
                .iter()
                .filter_map(|name| {
                    message
                        .fields
                        .get(name)
                        .map(|value| format!("{name}={}", value.explained))
                })
                .collect();
            println!(
                "fc={:#04x} ({}){} {}",
                message.function_code,
                message.handler,
                serial_suffix(message.serial_number),
                values.join(" ")
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout().lock();
            for name in message.order {
                if let Some(value) = message.fields.get(name) {
                    let _ = writeln!(out, "{name}\t{}", explained_to_json(&value.explained));
                }
            }
            let _ = out.flush();
        }
    }
}

/// Print wire bytes as lowercase hex.
pub fn print_hex(wire: &[u8]) {
    println!("{}", hex::encode(wire));
}

pub fn print_definition(definition: &ProtocolDefinition, schema: &FrameSchema, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(definition).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut elements = Table::new();
            elements
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "ELEMENT", "LENGTH", "ORDER", "CODEC"]);
            for element in schema.elements() {
                elements.add_row(vec![
                    element.index().to_string(),
                    element.kind().to_string(),
                    length_label(element.length_kind()),
                    format!("{:?}", element.byte_order()),
                    element.codec().name().to_string(),
                ]);
            }
            println!("protocol {} ({:?})", definition.name, schema.coverage());
            println!("{elements}");

            let mut functions = Table::new();
            functions
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CODE", "FUNCTION", "FIELD", "CODEC", "LENGTH"]);
            for function in &definition.functions {
                for field in &function.fields {
                    functions.add_row(vec![
                        format!("{:#04x}", function.code),
                        function.name.clone(),
                        field.name.clone(),
                        format!("{:?}", field.codec).to_lowercase(),
                        field.length.to_string(),
                    ]);
                }
            }
            println!("{functions}");
        }
        OutputFormat::Pretty => {
            let layout: Vec<String> = schema
                .elements()
                .iter()
                .map(|element| format!("{}[{}]", element.kind(), length_label(element.length_kind())))
                .collect();
            println!("protocol {}: {}", definition.name, layout.join(" "));
            for function in &definition.functions {
                let fields: Vec<String> = function
                    .fields
                    .iter()
                    .map(|field| format!("{}:{}", field.name, field.length))
                    .collect();
                println!(
                    "  fc={:#04x} {} {}",
                    function.code,
                    function.name,
                    fields.join(" ")
                );
            }
        }
    }
}

fn length_label(length: ElementLength) -> String {
    match length {
        ElementLength::Fixed(len) => len.to_string(),
        ElementLength::Dynamic => "dynamic".to_string(),
    }
}

fn serial_suffix(serial: Option<u64>) -> String {
    serial.map(|s| format!(" serial={s}")).unwrap_or_default()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
