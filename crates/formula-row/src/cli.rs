use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::{
    tokenize, Compiler, DataType, EvalContext, IntrinsicKind, IntrinsicRegistry, Row, Schema,
    Value, Volatility,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "formula-row")]
#[command(about = "Compile a row formula and evaluate it against one data row.")]
pub struct Args {
    /// Formula text, e.g. `Filter([1, 2, 3], x => OrderedAscending([2, x]))`.
    #[arg(required_unless_present = "functions")]
    formula: Option<String>,

    /// Declare a schema property as `NAME=TYPE` (repeatable). TYPE is `number`, `string`,
    /// `date`, `bool` or `set<...>` of one of those.
    #[arg(long = "property", value_name = "NAME=TYPE", value_parser = parse_property)]
    properties: Vec<(String, DataType)>,

    /// Row values as a JSON object keyed by property name. Dates are RFC 3339 strings.
    #[arg(long, value_name = "JSON")]
    row: Option<String>,

    /// Pin the clock seen by `Now()` (RFC 3339).
    #[arg(long, value_name = "RFC3339")]
    now: Option<DateTime<Utc>>,

    /// Print the token stream before compiling.
    #[arg(long)]
    tokens: bool,

    /// Print the compiled bytecode.
    #[arg(long)]
    disassemble: bool,

    /// List the built-in intrinsics and exit.
    #[arg(long)]
    functions: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log compiler decisions to stderr (overridden by `RUST_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct JsonToken<'a> {
    kind: String,
    start: usize,
    len: usize,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonIntrinsic {
    name: &'static str,
    parameters: Vec<String>,
    returns: String,
    volatile: bool,
    higher_order: bool,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    formula: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens: Option<Vec<JsonToken<'a>>>,
    #[serde(rename = "type")]
    data_type: &'a DataType,
    volatile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytecode: Option<Vec<String>>,
    value: &'a Value,
}

pub fn run() -> Result<()> {
    run_with_args(parse_args())
}

pub fn parse_args() -> Args {
    Args::parse()
}

pub fn run_with_args(args: Args) -> Result<()> {
    init_logging(args.verbose);
    let registry = IntrinsicRegistry::builtin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = if args.functions {
        write_functions(&mut out, &registry, args.format)
    } else {
        evaluate(&mut out, &registry, &args)
    };
    match result {
        Err(err) if is_broken_pipe(&err) => Ok(()),
        other => other,
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "formula_row=trace" } else { "warn" })
    });
    // A second initialization (e.g. in tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn evaluate(out: &mut impl Write, registry: &IntrinsicRegistry, args: &Args) -> Result<()> {
    let Some(formula) = args.formula.as_deref() else {
        bail!("a formula is required");
    };

    let mut schema = Schema::new();
    for (name, data_type) in &args.properties {
        schema.add_property(name.clone(), data_type.clone());
    }

    let tokens = tokenize(formula).context("failed to tokenize formula")?;
    // In text mode the token dump comes first, so it is there even when compilation fails.
    if args.tokens && matches!(args.format, OutputFormat::Text) {
        for token in &tokens {
            writeln!(
                out,
                "{:<14} {:<8} {:?}",
                token.kind.to_string(),
                token.span.to_string(),
                token.text(formula)
            )?;
        }
        writeln!(out)?;
        out.flush()?;
    }
    let compiled = Compiler::new(registry)
        .compile_tokens(formula, &tokens, &schema)
        .context("failed to compile formula")?;

    let row = match &args.row {
        Some(json) => parse_row(json, &schema)?,
        None => Row::new(),
    };
    let ctx = EvalContext { now_utc: args.now };
    let value = compiled
        .invoke(&ctx, &row)
        .context("failed to evaluate formula")?;

    match args.format {
        OutputFormat::Text => {
            if args.disassemble {
                write!(out, "{}", compiled.program())?;
                writeln!(out)?;
            }
            writeln!(out, "{value}")?;
        }
        OutputFormat::Json => {
            let report = JsonReport {
                formula,
                tokens: args.tokens.then(|| {
                    tokens
                        .iter()
                        .map(|t| JsonToken {
                            kind: t.kind.to_string(),
                            start: t.span.start,
                            len: t.span.len,
                            text: t.text(formula),
                        })
                        .collect()
                }),
                data_type: compiled.data_type(),
                volatile: compiled.is_volatile(),
                bytecode: args
                    .disassemble
                    .then(|| compiled.program().to_string().lines().map(str::to_string).collect()),
                value: &value,
            };
            serde_json::to_writer(&mut *out, &report)?;
            out.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn write_functions(
    out: &mut impl Write,
    registry: &IntrinsicRegistry,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for spec in registry.iter() {
                let mut notes = Vec::new();
                if spec.volatility == Volatility::Volatile {
                    notes.push("volatile");
                }
                if matches!(spec.kind, IntrinsicKind::HigherOrder(_)) {
                    notes.push("inlined");
                }
                if notes.is_empty() {
                    writeln!(out, "{spec}")?;
                } else {
                    writeln!(out, "{spec}  [{}]", notes.join(", "))?;
                }
            }
        }
        OutputFormat::Json => {
            let list: Vec<JsonIntrinsic> = registry
                .iter()
                .map(|spec| JsonIntrinsic {
                    name: spec.name,
                    parameters: spec.params.iter().map(ToString::to_string).collect(),
                    returns: spec.return_type.to_string(),
                    volatile: spec.volatility == Volatility::Volatile,
                    higher_order: matches!(spec.kind, IntrinsicKind::HigherOrder(_)),
                })
                .collect();
            serde_json::to_writer(&mut *out, &list)?;
            out.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn parse_property(input: &str) -> Result<(String, DataType), String> {
    let Some((name, ty)) = input.split_once('=') else {
        return Err(format!("expected NAME=TYPE, got {input:?}"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing property name in {input:?}"));
    }
    Ok((name.to_string(), ty.parse()?))
}

/// Build a row from a JSON object, converting each entry by its declared type. Entries the
/// schema does not declare are ignored.
fn parse_row(json: &str, schema: &Schema) -> Result<Row> {
    let parsed: serde_json::Value = serde_json::from_str(json).context("--row is not valid JSON")?;
    let serde_json::Value::Object(entries) = parsed else {
        bail!("--row must be a JSON object");
    };
    let mut row = Row::new();
    for (name, raw) in &entries {
        let Some(property) = schema.lookup(name) else {
            log::warn!("ignoring undeclared row value {name}");
            continue;
        };
        let value = json_to_value(raw, &property.data_type)
            .with_context(|| format!("row value {name} is not a {}", property.data_type))?;
        row.insert(name, value);
    }
    Ok(row)
}

fn json_to_value(raw: &serde_json::Value, data_type: &DataType) -> Result<Value> {
    use crate::BaseType;
    use serde_json::Value as Json;

    if let Some(element) = data_type.element() {
        let Json::Array(items) = raw else {
            bail!("expected an array, got {raw}");
        };
        return Ok(Value::Set(
            items
                .iter()
                .map(|item| json_to_value(item, &element))
                .collect::<Result<_>>()?,
        ));
    }

    Ok(match (data_type.base(), raw) {
        (Some(BaseType::Number), Json::Number(n)) => match n.as_f64() {
            Some(n) => Value::Number(n),
            None => bail!("{n} is not representable as a number"),
        },
        (Some(BaseType::String), Json::String(s)) => Value::Text(s.clone()),
        (Some(BaseType::Bool), Json::Bool(b)) => Value::Bool(*b),
        (Some(BaseType::Date), Json::String(s)) => Value::Date(
            DateTime::parse_from_rfc3339(s)
                .with_context(|| format!("{s:?} is not an RFC 3339 date"))?
                .with_timezone(&Utc),
        ),
        _ => bail!("cannot convert {raw}"),
    })
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}
