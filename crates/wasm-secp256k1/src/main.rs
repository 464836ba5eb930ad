use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use wasm_secp256k1::parser::parse_wasm;
use wasm_secp256k1::{Format, ImportNames, LoadOptions, RecoveryId, Secp256k1, WasmGuest};

/// wasm-secp256k1: secp256k1 operations through a sandboxed libsecp256k1 module.
///
/// Keys, hashes and signatures are read and written as hex.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// libsecp256k1 WebAssembly module (.wasm)
    module: PathBuf,

    /// Log tag for guest output and abort messages
    #[arg(long, default_value = "wasm-secp256k1")]
    tag: String,

    /// The module uses the minified import table of an emscripten release build
    #[arg(long)]
    minified_imports: bool,

    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the module's imports, exports and memory, and whether it can be bound
    Inspect,
    /// Generate a secret key
    Keygen,
    /// Derive the public key of a secret key
    Pubkey {
        sk: String,
        #[arg(long)]
        uncompressed: bool,
    },
    /// Sign a 32-byte message hash
    Sign {
        sk: String,
        hash: String,
        /// 32 bytes of extra nonce entropy
        #[arg(long)]
        entropy: Option<String>,
    },
    /// Verify a 64-byte compact signature
    Verify { signature: String, hash: String, pk: String },
    /// Recover the public key from a compact signature and its recovery id
    Recover {
        signature: String,
        hash: String,
        recovery_id: i32,
        #[arg(long)]
        uncompressed: bool,
    },
    /// Derive an ECDH shared secret
    Ecdh { sk: String, pk: String },
    /// Tweak a secret or public key by a 32-byte scalar
    Tweak {
        #[arg(value_enum)]
        op: TweakOp,
        #[arg(value_enum)]
        target: TweakTarget,
        key: String,
        tweak: String,
        #[arg(long)]
        uncompressed: bool,
    },
    /// SHA-256 computed inside the module
    Sha256 {
        data: String,
        /// Treat DATA as UTF-8 text instead of hex
        #[arg(long)]
        text: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TweakOp {
    Add,
    Mul,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TweakTarget {
    Secret,
    Public,
}

fn format(uncompressed: bool) -> Format {
    if uncompressed {
        Format::Uncompressed
    } else {
        Format::Compressed
    }
}

fn decode(label: &str, s: &str) -> Result<Vec<u8>> {
    hex::decode(s.trim_start_matches("0x")).with_context(|| format!("{label} is not valid hex"))
}

fn decode_array<const N: usize>(label: &str, s: &str) -> Result<[u8; N]> {
    let bytes = decode(label, s)?;
    match <[u8; N]>::try_from(bytes.as_slice()) {
        Ok(array) => Ok(array),
        Err(_) => bail!("{label} must be {N} bytes, got {}", bytes.len()),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn inspect(wasm_bytes: &[u8], options: &LoadOptions) -> Result<()> {
    let info = parse_wasm(wasm_bytes).context("failed to parse WebAssembly module")?;
    println!("wasm version: {}", info.wasm_version);
    if let Some(memory) = &info.memory {
        println!(
            "memory: {} pages (max {})",
            memory.initial_pages,
            memory
                .maximum_pages
                .map_or_else(|| "none".to_string(), |m| m.to_string())
        );
    }
    println!("imports:");
    for import in &info.imports {
        println!("  {}.{} ({:?})", import.module_name, import.name, import.kind);
    }
    println!("exports:");
    for export in &info.exports {
        println!("  {} ({:?})", export.name, export.kind);
    }
    match info.check(options) {
        Ok(()) => println!("bindable: yes"),
        Err(e) => println!("bindable: no ({e})"),
    }
    Ok(())
}

fn run(secp: &mut Secp256k1<WasmGuest>, command: Command) -> Result<String> {
    let out = match command {
        Command::Inspect => bail!("inspect runs without instantiating the module"),
        Command::Keygen => hex::encode(secp.generate_secret_key()?),
        Command::Pubkey { sk, uncompressed } => {
            let sk = decode("secret key", &sk)?;
            hex::encode(secp.derive_public_key(&sk, format(uncompressed))?)
        }
        Command::Sign { sk, hash, entropy } => {
            let sk = decode("secret key", &sk)?;
            let hash = decode_array::<32>("hash", &hash)?;
            let entropy = entropy
                .map(|e| decode_array::<32>("entropy", &e))
                .transpose()?;
            let sig = secp.sign(&sk, &hash, entropy.as_ref())?;
            format!(
                "{} {}",
                hex::encode(sig.compact),
                sig.recovery_id.to_i32()
            )
        }
        Command::Verify {
            signature,
            hash,
            pk,
        } => {
            let signature = decode_array::<64>("signature", &signature)?;
            let hash = decode_array::<32>("hash", &hash)?;
            let pk = decode("public key", &pk)?;
            secp.verify(&signature, &hash, &pk)?.to_string()
        }
        Command::Recover {
            signature,
            hash,
            recovery_id,
            uncompressed,
        } => {
            let signature = decode_array::<64>("signature", &signature)?;
            let hash = decode_array::<32>("hash", &hash)?;
            let recovery_id = RecoveryId::try_from(recovery_id)?;
            hex::encode(secp.recover(&signature, &hash, recovery_id, format(uncompressed))?)
        }
        Command::Ecdh { sk, pk } => {
            let sk = decode("secret key", &sk)?;
            let pk = decode("public key", &pk)?;
            hex::encode(secp.ecdh(&sk, &pk)?)
        }
        Command::Tweak {
            op,
            target,
            key,
            tweak,
            uncompressed,
        } => {
            let tweak = decode_array::<32>("tweak", &tweak)?;
            match target {
                TweakTarget::Secret => {
                    let mut sk = decode_array::<32>("secret key", &key)?;
                    match op {
                        TweakOp::Add => secp.tweak_secret_key_add(&mut sk, &tweak)?,
                        TweakOp::Mul => secp.tweak_secret_key_mul(&mut sk, &tweak)?,
                    }
                    hex::encode(sk)
                }
                TweakTarget::Public => {
                    let pk = decode("public key", &key)?;
                    let pk = match op {
                        TweakOp::Add => {
                            secp.tweak_public_key_add(&pk, &tweak, format(uncompressed))?
                        }
                        TweakOp::Mul => {
                            secp.tweak_public_key_mul(&pk, &tweak, format(uncompressed))?
                        }
                    };
                    hex::encode(pk)
                }
            }
        }
        Command::Sha256 { data, text } => {
            let data = if text {
                data.into_bytes()
            } else {
                decode("data", &data)?
            };
            hex::encode(secp.sha256(&data)?)
        }
    };
    Ok(out)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let wasm_bytes = fs::read(&cli.module)
        .with_context(|| format!("failed to read {}", cli.module.display()))?;

    let mut options = LoadOptions::default().with_tag(cli.tag.clone());
    if cli.minified_imports {
        options = options.with_imports(ImportNames::minified());
    }

    if matches!(cli.command, Command::Inspect) {
        return inspect(&wasm_bytes, &options);
    }

    let mut secp = Secp256k1::load_with(&wasm_bytes, &options)
        .with_context(|| format!("failed to load {}", cli.module.display()))?;
    println!("{}", run(&mut secp, cli.command)?);
    Ok(())
}
