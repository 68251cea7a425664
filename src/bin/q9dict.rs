use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use q9_engine::dict::{Dictionary, TableDictionary};
use q9_engine::script::{convert_text, ScriptMode};
use q9_engine::settings;

#[derive(Parser)]
#[command(name = "q9dict", about = "Q9 dictionary build tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile codes.tsv, relates.tsv and ts.tsv into a binary dictionary
    Compile {
        /// Directory holding the text sources
        input_dir: PathBuf,
        /// Output file
        output_file: PathBuf,
    },
    /// Show dictionary statistics
    Info {
        /// Dictionary file
        file: PathBuf,
        /// Also dump every code in codes.tsv format
        #[arg(long)]
        codes: bool,
    },
    /// Candidates for a keypad code
    Lookup {
        /// Dictionary file
        dict_file: PathBuf,
        /// One to three digits
        code: String,
    },
    /// Relate words for a character
    Related {
        /// Dictionary file
        dict_file: PathBuf,
        /// A single character
        character: String,
    },
    /// Convert text between traditional and simplified
    Convert {
        /// Dictionary file
        dict_file: PathBuf,
        /// Text to convert
        text: String,
        /// Convert to traditional instead of simplified
        #[arg(long)]
        traditional: bool,
    },
    /// Export default settings as TOML
    SettingsExport,
    /// Validate a custom settings TOML file
    SettingsValidate {
        /// Path to the TOML file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Compile {
            input_dir,
            output_file,
        } => {
            let dict = TableDictionary::from_source_dir(&input_dir)
                .with_context(|| format!("reading sources in {}", input_dir.display()))?;
            dict.save(&output_file)
                .with_context(|| format!("writing {}", output_file.display()))?;
            print_stats(&dict);
            println!("Wrote {}", output_file.display());
        }
        Command::Info { file, codes } => {
            let dict = open(&file)?;
            print_stats(&dict);
            if codes {
                for (code, candidates) in dict.iter_codes() {
                    println!("{code}\t{}", candidates.concat());
                }
            }
        }
        Command::Lookup { dict_file, code } => {
            let dict = open(&dict_file)?;
            match dict.lookup_by_code(&code) {
                Some(candidates) => {
                    for (page, chunk) in candidates.chunks(9).enumerate() {
                        let line: Vec<String> = chunk
                            .iter()
                            .enumerate()
                            .map(|(i, c)| format!("{}:{c}", i + 1))
                            .collect();
                        println!("page {}  {}", page + 1, line.join(" "));
                    }
                }
                None => println!("{code}: no candidates"),
            }
        }
        Command::Related {
            dict_file,
            character,
        } => {
            let dict = open(&dict_file)?;
            match dict.lookup_related(&character) {
                Some(words) if !words.is_empty() => println!("{}", words.join(" ")),
                _ => println!("{character}: no relate words"),
            }
        }
        Command::Convert {
            dict_file,
            text,
            traditional,
        } => {
            let dict = open(&dict_file)?;
            let out = if traditional {
                text.chars()
                    .map(|c| dict.convert_script(c.encode_utf8(&mut [0; 4]), false))
                    .collect::<String>()
            } else {
                convert_text(&dict, &text, ScriptMode::Simplified)
            };
            println!("{out}");
        }
        Command::SettingsExport => print!("{}", settings::default_toml()),
        Command::SettingsValidate { file } => {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let s = settings::parse_settings_toml(&content)?;
            println!(
                "OK: capture.backend={:?}, engine.poll_interval_ms={}, output.script={}",
                s.capture.backend,
                s.engine.poll_interval_ms,
                s.output.script.label()
            );
        }
    }
    Ok(())
}

fn open(path: &Path) -> Result<TableDictionary> {
    TableDictionary::open(path).with_context(|| format!("opening {}", path.display()))
}

fn print_stats(dict: &TableDictionary) {
    let stats = dict.stats();
    println!("codes:        {}", stats.codes);
    println!("candidates:   {}", stats.candidates);
    println!("relates:      {}", stats.relates);
    println!("script pairs: {}", stats.script_pairs);
}
