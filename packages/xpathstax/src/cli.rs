//! Command-line interface for streaming XPath queries.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Parser, Subcommand};
use console::style;
use serde::Serialize;

use crate::config::parse_property;
use crate::context::NodeContext;
use crate::error::Result;
use crate::parser::XPathStaxParser;
use crate::registry::{HandlerResult, NodeHandler};
use crate::types::XmlNode;
use crate::xpath::XPathRequest;

/// xpathstax - Stream large XML documents and print elements matching
/// XPath-like expressions.
#[derive(Parser)]
#[command(name = "xpathstax")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print every element matching one of the expressions.
    Match {
        /// XML file to read
        file: PathBuf,

        /// Path expression (e.g., /catalog/book[@id='1']), repeatable
        #[arg(short = 'x', long = "xpath", required = true)]
        xpaths: Vec<String>,

        /// Tokenizer property as key=value (e.g., trim_text=true), repeatable
        #[arg(short, long = "property")]
        properties: Vec<String>,

        /// Print one JSON object per matched element
        #[arg(long)]
        json: bool,
    },

    /// Count the elements matching each expression.
    Count {
        /// XML file to read
        file: PathBuf,

        /// Path expression, repeatable
        #[arg(short = 'x', long = "xpath", required = true)]
        xpaths: Vec<String>,

        /// Tokenizer property as key=value, repeatable
        #[arg(short, long = "property")]
        properties: Vec<String>,
    },

    /// Compile expressions and print their normalized form.
    Check {
        /// Path expressions to compile
        #[arg(required = true)]
        expressions: Vec<String>,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let out = Arc::new(Mutex::new(io::stdout()));
    execute(cli.command, &out)
}

/// Execute a parsed command, writing results to `out`.
pub fn execute<W: Write + Send + 'static>(command: Commands, out: &Arc<Mutex<W>>) -> Result<()> {
    match command {
        Commands::Match {
            file,
            xpaths,
            properties,
            json,
        } => match_command(&file, &xpaths, &properties, json, out),
        Commands::Count {
            file,
            xpaths,
            properties,
        } => count_command(&file, &xpaths, &properties, out),
        Commands::Check { expressions } => check_command(&expressions, out),
    }
}

/// Build a parser with the given tokenizer properties.
fn configured_parser(properties: &[String]) -> Result<XPathStaxParser> {
    let mut parser = XPathStaxParser::new();
    for pair in properties {
        let (key, value) = parse_property(pair)?;
        parser.set_xml_property(&key, &value)?;
    }
    Ok(parser)
}

/// Compile all expressions before touching the input.
///
/// Expressions compiling to the same pattern share one registry key, so
/// only the first of them is kept.
fn compile_all(xpaths: &[String]) -> Result<Vec<XPathRequest>> {
    let mut requests: Vec<XPathRequest> = Vec::with_capacity(xpaths.len());
    for xpath in xpaths {
        let request = XPathRequest::parse(xpath)?;
        if requests.contains(&request) {
            tracing::debug!(expression = %request.expression(), "Skipping duplicate expression");
            continue;
        }
        requests.push(request);
    }
    Ok(requests)
}

/// Execute the match command.
fn match_command<W: Write + Send + 'static>(
    file: &Path,
    xpaths: &[String],
    properties: &[String],
    json: bool,
    out: &Arc<Mutex<W>>,
) -> Result<()> {
    let parser = configured_parser(properties)?;
    for request in compile_all(xpaths)? {
        let handler = PrintHandler {
            expression: request.expression().to_string(),
            json,
            out: Arc::clone(out),
        };
        parser.add_handler(request, Arc::new(handler));
    }
    parser.parse_file(file)
}

/// Execute the count command.
fn count_command<W: Write + Send + 'static>(
    file: &Path,
    xpaths: &[String],
    properties: &[String],
    out: &Arc<Mutex<W>>,
) -> Result<()> {
    let parser = configured_parser(properties)?;
    let mut counters = Vec::new();
    for request in compile_all(xpaths)? {
        let counter = Arc::new(CountHandler::default());
        counters.push((request.expression().to_string(), Arc::clone(&counter)));
        parser.add_handler(request, counter);
    }
    parser.parse_file(file)?;

    let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
    for (expression, counter) in counters {
        writeln!(
            out,
            "{}\t{}",
            style(counter.count.load(Ordering::Relaxed)).bold(),
            expression
        )?;
    }
    Ok(())
}

/// Execute the check command.
fn check_command<W: Write>(expressions: &[String], out: &Arc<Mutex<W>>) -> Result<()> {
    let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
    for expression in expressions {
        let request = XPathRequest::parse(expression)?;
        writeln!(out, "{} {}", style("ok").green(), request)?;
    }
    Ok(())
}

/// JSON line written for a matched element.
#[derive(Serialize)]
struct MatchRecord<'a> {
    expression: &'a str,
    #[serde(flatten)]
    node: &'a XmlNode,
}

/// Writes every matched element as soon as it closes.
struct PrintHandler<W> {
    expression: String,
    json: bool,
    out: Arc<Mutex<W>>,
}

impl<W: Write + Send> NodeHandler for PrintHandler<W> {
    fn process_node(&self, node: &XmlNode, _context: &NodeContext) -> HandlerResult {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if self.json {
            let record = MatchRecord {
                expression: &self.expression,
                node,
            };
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)?;
            return Ok(());
        }

        let attributes: Vec<String> = node
            .attributes
            .iter()
            .map(|(name, value)| format!("{name}={value:?}"))
            .collect();
        let attributes = if attributes.is_empty() {
            String::new()
        } else {
            format!(" [{}]", attributes.join(" "))
        };
        writeln!(
            out,
            "{}{} {:?}",
            style(&node.path).cyan(),
            style(attributes).dim(),
            node.text.trim()
        )?;
        Ok(())
    }
}

#[derive(Default)]
struct CountHandler {
    count: AtomicU64,
}

impl NodeHandler for CountHandler {
    fn process_node(&self, _node: &XmlNode, _context: &NodeContext) -> HandlerResult {
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn output(out: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(out.lock().unwrap().clone()).unwrap()
    }

    fn fixture(xml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(xml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_cli_parse_match() {
        let cli = Cli::parse_from([
            "xpathstax",
            "match",
            "doc.xml",
            "-x",
            "/root/a",
            "--xpath",
            "//b",
            "-p",
            "trim_text=true",
            "--json",
        ]);

        let Commands::Match {
            file,
            xpaths,
            properties,
            json,
        } = cli.command
        else {
            panic!("expected match command");
        };
        assert_eq!(file, PathBuf::from("doc.xml"));
        assert_eq!(xpaths, vec!["/root/a", "//b"]);
        assert_eq!(properties, vec!["trim_text=true"]);
        assert!(json);
    }

    #[test]
    fn test_cli_requires_xpath() {
        assert!(Cli::try_parse_from(["xpathstax", "match", "doc.xml"]).is_err());
    }

    #[test]
    fn test_match_command_json() {
        let file = fixture(r#"<root><a x="1">hi</a><a x="2">bye</a></root>"#);
        let out = Arc::new(Mutex::new(Vec::new()));

        execute(
            Commands::Match {
                file: file.path().to_path_buf(),
                xpaths: vec!["/root/a[@x='2']".to_string()],
                properties: Vec::new(),
                json: true,
            },
            &out,
        )
        .unwrap();

        assert_eq!(
            output(&out),
            "{\"expression\":\"/root/a[@x='2']\",\"name\":\"a\",\"path\":\"/root/a\",\"attributes\":[[\"x\",\"2\"]],\"text\":\"bye\"}\n"
        );
    }

    #[test]
    fn test_count_command() {
        let file = fixture("<root><a/><a/><b><a/></b></root>");
        let out = Arc::new(Mutex::new(Vec::new()));

        execute(
            Commands::Count {
                file: file.path().to_path_buf(),
                xpaths: vec!["/root/a".to_string(), "//a".to_string()],
                properties: Vec::new(),
            },
            &out,
        )
        .unwrap();

        let text = console::strip_ansi_codes(&output(&out)).to_string();
        assert_eq!(text, "2\t/root/a\n3\t//a\n");
    }

    #[test]
    fn test_count_command_duplicate_expressions() {
        let file = fixture("<r><a/><a/></r>");
        let out = Arc::new(Mutex::new(Vec::new()));

        execute(
            Commands::Count {
                file: file.path().to_path_buf(),
                xpaths: vec![
                    "/r/a".to_string(),
                    "/r/a".to_string(),
                    "/r/a[text()=\"\"]".to_string(),
                    "/r/a[text()='']".to_string(),
                ],
                properties: Vec::new(),
            },
            &out,
        )
        .unwrap();

        let text = console::strip_ansi_codes(&output(&out)).to_string();
        assert_eq!(text, "2\t/r/a\n2\t/r/a[text()=\"\"]\n");
    }

    #[test]
    fn test_match_command_duplicate_expressions() {
        let file = fixture(r#"<root><a x="1">hi</a></root>"#);
        let out = Arc::new(Mutex::new(Vec::new()));

        execute(
            Commands::Match {
                file: file.path().to_path_buf(),
                xpaths: vec!["/root/a".to_string(), " /root/a".to_string()],
                properties: Vec::new(),
                json: true,
            },
            &out,
        )
        .unwrap();

        assert_eq!(output(&out).lines().count(), 1);
    }

    #[test]
    fn test_check_command_rejects_invalid() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let result = execute(
            Commands::Check {
                expressions: vec!["/ok".to_string(), "not-absolute".to_string()],
            },
            &out,
        );

        assert!(result.is_err());
        assert!(console::strip_ansi_codes(&output(&out)).contains("ok /ok"));
    }

    #[test]
    fn test_bad_property_fails_before_reading() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let result = execute(
            Commands::Count {
                file: PathBuf::from("/nonexistent/doc.xml"),
                xpaths: vec!["/a".to_string()],
                properties: vec!["validating=true".to_string()],
            },
            &out,
        );
        assert!(matches!(
            result,
            Err(crate::XPathStaxError::InvalidProperty { .. })
        ));
    }
}
