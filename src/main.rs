use charcard::png::text::parse_text_chunk;
use charcard::{
    read_card, read_lorebook, repair_card, validate_card, validate_lorebook, write_card_to_charx,
    write_card_to_json, write_card_to_png, AssetData, CardInput, CharacterCard, ReadOptions, ValidateOptions,
    WriteCharxOptions, WritePngOptions,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "charcard", about = "Character card codec and repair tool")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a card (PNG, CHARX or JSON) and print it as V3 JSON
    Read {
        input: PathBuf,
        /// Fail on a CRC mismatch in the card chunk
        #[arg(long)]
        strict: bool,
        /// Leave `@@` decorator lines in lorebook entry content
        #[arg(long)]
        raw_decorators: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Embed a card into a PNG image
    WritePng {
        /// Card to embed (PNG, CHARX or JSON)
        card: PathBuf,
        #[arg(short, long)]
        image: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Do not add the legacy V2 `chara` chunk
        #[arg(long)]
        no_v2: bool,
        /// Write parsed decorators as a JSON list instead of `@@` lines
        #[arg(long)]
        raw_decorators: bool,
    },
    /// Pack a card and its assets into a CHARX archive
    WriteCharx {
        card: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Asset as type:name:ext:path (repeatable)
        #[arg(short, long, value_parser = parse_asset)]
        asset: Vec<AssetArg>,
    },
    /// Recover what is left of a damaged card PNG
    Repair {
        input: PathBuf,
        /// Write the recovered card JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the image with card chunks stripped here
        #[arg(long)]
        clean_image: Option<PathBuf>,
    },
    /// Validate card (or lorebook) JSON
    Validate {
        input: PathBuf,
        #[arg(long)]
        strict: bool,
        #[arg(long)]
        lorebook: bool,
    },
    /// Read a standalone lorebook (PNG or JSON) and print it
    Lorebook {
        input: PathBuf,
        #[arg(long)]
        raw_decorators: bool,
    },
    /// List PNG chunks with CRC status
    Chunks {
        input: PathBuf,
    },
    /// List CHARX/ZIP entries
    Entries {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {

        // ── Read ─────────────────────────────────────────────────────────────
        Commands::Read { input, strict, raw_decorators, output } => {
            let opts = ReadOptions { strict, parse_decorators: !raw_decorators };
            let card = load_card(&input, &opts)?;
            emit(&write_card_to_json(&card)?, output.as_deref())?;
        }

        // ── WritePng ─────────────────────────────────────────────────────────
        Commands::WritePng { card, image, output, no_v2, raw_decorators } => {
            let card = load_card(&card, &ReadOptions::default())?;
            let opts = WritePngOptions { include_v2_chunk: !no_v2, serialize_decorators: !raw_decorators };
            let png = write_card_to_png(&card, &std::fs::read(&image)?, &opts)?;
            std::fs::write(&output, png)?;
            println!("Created: {}", output.display());
        }

        // ── WriteCharx ───────────────────────────────────────────────────────
        Commands::WriteCharx { card, output, asset } => {
            let card = load_card(&card, &ReadOptions::default())?;
            let mut assets = Vec::with_capacity(asset.len());
            for AssetArg { asset_type, name, ext, path } in asset {
                let data = std::fs::read(&path)?;
                println!("  packed  {}", path.display());
                assets.push(AssetData { asset_type, name, ext, data });
            }
            let charx = write_card_to_charx(&card, &WriteCharxOptions { assets })?;
            std::fs::write(&output, charx)?;
            println!("Created: {}", output.display());
        }

        // ── Repair ───────────────────────────────────────────────────────────
        Commands::Repair { input, output, clean_image } => {
            let result = repair_card(&std::fs::read(&input)?);
            println!("{}", result.summary());
            for warning in &result.warnings {
                println!("  warning    {warning}");
            }
            println!("  recovered  {}", result.recovered.join(", "));
            if let Some(path) = clean_image {
                std::fs::write(&path, &result.image)?;
                println!("Clean image: {}", path.display());
            }
            emit(&write_card_to_json(&result.card)?, output.as_deref())?;
        }

        // ── Validate ─────────────────────────────────────────────────────────
        Commands::Validate { input, strict, lorebook } => {
            let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&input)?)?;
            let opts = ValidateOptions { strict };
            let result = if lorebook { validate_lorebook(&value, &opts) } else { validate_card(&value, &opts) };
            if result.valid {
                println!("{}: valid", input.display());
            } else {
                println!("{}: {} error(s)", input.display(), result.errors.len());
                for err in &result.errors {
                    println!("  {err}");
                }
                std::process::exit(1);
            }
        }

        // ── Lorebook ─────────────────────────────────────────────────────────
        Commands::Lorebook { input, raw_decorators } => {
            let opts = ReadOptions { parse_decorators: !raw_decorators, ..ReadOptions::default() };
            let bytes = std::fs::read(&input)?;
            let book = if charcard::png::is_png(&bytes) {
                read_lorebook(&bytes, &opts)?
            } else {
                read_lorebook(String::from_utf8(bytes)?.as_str(), &opts)?
            };
            println!("{}", serde_json::to_string_pretty(&book)?);
        }

        // ── Chunks ───────────────────────────────────────────────────────────
        Commands::Chunks { input } => {
            let chunks = charcard::png::read_chunks(&std::fs::read(&input)?)?;
            println!("{:<6} {:>10} {:>10}  {:<5}  Keyword", "Type", "Length", "CRC", "Valid");
            for chunk in &chunks {
                let keyword = parse_text_chunk(chunk).map(|t| t.keyword).unwrap_or_default();
                println!("{:<6} {:>10} {:>#10x}  {:<5}  {}",
                    chunk.type_str(), chunk.length, chunk.crc, chunk.crc_valid(), keyword);
            }
        }

        // ── Entries ──────────────────────────────────────────────────────────
        Commands::Entries { input } => {
            let entries = charcard::zip::list_entries(&std::fs::read(&input)?)?;
            println!("{:<40} {:>6} {:>12} {:>12}  CRC32", "Name", "Method", "Size", "Compressed");
            for e in &entries {
                println!("{:<40} {:>6} {:>12} {:>12}  {:08x}",
                    e.name, e.method, e.uncompressed_size, e.compressed_size, e.crc32);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// PNG and CHARX are read as bytes; anything else is taken as JSON text.
fn load_card(path: &Path, opts: &ReadOptions) -> Result<CharacterCard, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let card = if charcard::png::is_png(&bytes) || charcard::zip::is_zip(&bytes) {
        read_card(CardInput::Bytes(&bytes), opts)?
    } else {
        read_card(String::from_utf8(bytes)?.as_str(), opts)?
    };
    Ok(card)
}

fn emit(text: &str, output: Option<&Path>) -> std::io::Result<()> {
    match output {
        Some(path) => std::fs::write(path, text),
        None       => {
            println!("{text}");
            Ok(())
        }
    }
}

/// `--asset type:name:ext:path`
#[derive(Debug, Clone)]
struct AssetArg {
    asset_type: String,
    name:       String,
    ext:        String,
    path:       PathBuf,
}

fn parse_asset(s: &str) -> Result<AssetArg, String> {
    match s.splitn(4, ':').collect::<Vec<_>>()[..] {
        [asset_type, name, ext, path] if !path.is_empty() => Ok(AssetArg {
            asset_type: asset_type.to_owned(),
            name:       name.to_owned(),
            ext:        ext.to_owned(),
            path:       PathBuf::from(path),
        }),
        _ => Err(format!("expected type:name:ext:path, got {s:?}")),
    }
}
