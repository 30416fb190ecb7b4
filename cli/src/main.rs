use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};

use clap::{ArgAction, Parser};
use quill_json::{
    DecodeOptions, EncodeOptions, ErrorDetail, Input, Reader, Recycler, Token, Writer,
};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Streaming JSON minifier and validator")]
struct Args {
    /// Input file path. Omit or use '-' to read from stdin.
    input: Option<String>,

    /// Output file path (prints to stdout if omitted).
    #[arg(short, long, value_name = "file")]
    output: Option<String>,

    /// Only check that the input is well formed.
    #[arg(long)]
    validate: bool,

    /// Treat input and output as a whitespace-separated JSON stream.
    #[arg(long)]
    stream: bool,

    /// Keep fields whose value is null.
    #[arg(long = "serialize-nulls", action = ArgAction::Set, default_value_t = true, value_name = "bool")]
    serialize_nulls: bool,

    /// Keep fields whose value is an empty array or object.
    #[arg(long = "serialize-empty", action = ArgAction::Set, default_value_t = true, value_name = "bool")]
    serialize_empty: bool,

    /// Read and write buffer size in bytes.
    #[arg(long = "buffer-size", value_name = "bytes", default_value_t = quill_json::constants::DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Quote the input around a failure in error messages.
    #[arg(long)]
    context: bool,

    /// Log more; repeat for trace output.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run(&args) {
        eprintln!("ERROR  {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let decode = DecodeOptions::new()
        .with_json_stream(args.stream)
        .with_buffer_size(args.buffer_size)
        .with_error_detail(if args.context {
            ErrorDetail::Context
        } else {
            ErrorDetail::Position
        });
    let recycler = Recycler::shared();
    let mut reader = recycler.acquire_reader_with(open_input(args.input.as_deref())?, &decode);

    if args.validate {
        validate(&mut reader, args.stream)?;
        tracing::debug!(input = input_label(args.input.as_deref()), "input is valid");
        return Ok(());
    }

    let encode = EncodeOptions::new()
        .with_json_stream(args.stream)
        .with_serialize_nulls(args.serialize_nulls)
        .with_serialize_empty(args.serialize_empty)
        .with_buffer_size(args.buffer_size);
    let mut writer = recycler.acquire_writer_with(Some(open_output(args.output.as_deref())?), &encode);

    let result = rewrite(&mut reader, &mut writer, args.stream);
    if result.is_err() {
        writer.mark_incomplete();
    }
    let count = result?;
    if count > 0 {
        writer.finish()?;
    }
    writer.close()?;
    tracing::debug!(values = count, bytes = writer.size(), "rewrote input");

    if let Some(path) = args.output.as_deref().filter(|path| *path != "-") {
        println!("✔ Wrote {} → {path}", input_label(args.input.as_deref()));
    }
    Ok(())
}

fn validate(reader: &mut Reader<'_>, stream: bool) -> quill_json::Result<()> {
    if stream {
        while reader.has_next_value()? {
            reader.skip_value()?;
        }
        return Ok(());
    }
    reader.skip_value()?;
    reader.finish()
}

/// Copies every top-level value; returns how many were copied.
fn rewrite(reader: &mut Reader<'_>, writer: &mut Writer<'_>, stream: bool) -> quill_json::Result<usize> {
    if !stream {
        copy_value(reader, writer)?;
        reader.finish()?;
        return Ok(1);
    }
    let mut count = 0;
    while reader.has_next_value()? {
        copy_value(reader, writer)?;
        count += 1;
    }
    Ok(count)
}

fn copy_value(reader: &mut Reader<'_>, writer: &mut Writer<'_>) -> quill_json::Result<()> {
    let token = reader
        .peek_token()?
        .ok_or_else(|| quill_json::Error::premature_end("expected a value"))?;
    match token {
        Token::BeginArray => {
            reader.begin_array()?;
            if !reader.has_next_element()? {
                reader.end_array()?;
                return writer.empty_array();
            }
            writer.begin_array()?;
            loop {
                copy_value(reader, writer)?;
                if !reader.has_next_element()? {
                    break;
                }
            }
            reader.end_array()?;
            writer.end_array()
        }
        Token::BeginObject => {
            reader.begin_object()?;
            if !reader.has_next_field()? {
                reader.end_object()?;
                return writer.empty_object();
            }
            writer.begin_object()?;
            loop {
                writer.name(reader.next_field()?)?;
                copy_value(reader, writer)?;
                if !reader.has_next_field()? {
                    break;
                }
            }
            reader.end_object()?;
            writer.end_object()
        }
        Token::String => writer.write_str(reader.read_string()?),
        Token::Number => writer.write_raw(reader.read_number_text()?.as_bytes()),
        Token::Boolean => writer.write_bool(reader.read_bool()?),
        Token::Null => {
            reader.read_null()?;
            writer.write_null()
        }
        Token::EndArray | Token::EndObject | Token::FieldName => {
            Err(quill_json::Error::malformed("expected a value"))
        }
    }
}

fn open_input(input: Option<&str>) -> Result<Input<'static>, Box<dyn Error>> {
    let read: Box<dyn Read> = match input {
        None | Some("-") => Box::new(io::stdin().lock()),
        Some(path) => Box::new(fs::File::open(path)?),
    };
    Ok(Input::Stream(read))
}

fn open_output(output: Option<&str>) -> Result<Box<dyn Write>, Box<dyn Error>> {
    match output {
        Some(path) if path != "-" => Ok(Box::new(fs::File::create(path)?)),
        _ => Ok(Box::new(io::stdout().lock())),
    }
}

fn input_label(input: Option<&str>) -> &str {
    match input {
        None | Some("-") => "stdin",
        Some(path) => path,
    }
}
