use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use flate64::{CompressionLevel, Decoder, DecoderConfig, Encoder, EncoderConfig};
use memmap2::Mmap;

#[derive(Parser, Debug)]
#[command(name = "flate64")]
#[command(about = "Compress and decompress raw DEFLATE and Deflate64 streams")]
#[command(version)]
struct Args {
    /// Input file (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (use - for stdout)
    #[arg(short, long)]
    output: PathBuf,

    /// Decompress instead of compress
    #[arg(short, long)]
    decompress: bool,

    /// Compression level (0 = store, 9 = best)
    #[arg(short, long, default_value = "5", value_parser = clap::value_parser!(u8).range(0..=9))]
    level: u8,

    /// Use the Deflate64 format (64 KiB window, long matches)
    #[arg(long)]
    deflate64: bool,

    /// Encoder properties, e.g. "fb=64,mc=32,pass=3,mf=bt3"
    #[arg(long)]
    props: Option<String>,

    /// Expected uncompressed size when decompressing
    #[arg(long)]
    size: Option<u64>,

    /// Decode the compressed output again and compare CRC-32 checksums
    #[arg(long)]
    verify: bool,

    /// Show verbose statistics
    #[arg(short, long)]
    verbose: bool,
}

const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn is_stdio(path: &Path) -> bool {
    path.to_str() == Some("-")
}

fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    Ok(if is_stdio(path) {
        Box::new(io::stdout().lock())
    } else {
        Box::new(BufWriter::new(File::create(path)?))
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    if args.decompress {
        run_decompress(&args)
    } else {
        run_compress(&args)
    }
}

/// Writer that counts bytes and checksums them on the way through
struct Tally<W> {
    inner: W,
    bytes: u64,
    crc: crc32fast::Hasher,
}

impl<W: Write> Tally<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0, crc: crc32fast::Hasher::new() }
    }
}

impl<W: Write> Write for Tally<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.crc.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn run_compress(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EncoderConfig {
        deflate64: args.deflate64,
        ..EncoderConfig::new(CompressionLevel::try_from(args.level)?)
    };
    if let Some(props) = &args.props {
        config.apply_properties(props)?;
    }

    let start = Instant::now();
    // Keep a copy of the compressed stream only when it must be verified
    let mut verify_copy = Vec::new();
    let output = open_output(&args.output)?;
    let (input_bytes, input_crc, output_bytes) = {
        let sink: Box<dyn Write + '_> = if args.verify {
            Box::new(TeeWriter { first: output, second: &mut verify_copy })
        } else {
            Box::new(output)
        };
        let mut encoder = Encoder::new(Tally::new(sink), &config)?;
        let mut input_crc = crc32fast::Hasher::new();

        if is_stdio(&args.input) {
            let mut stdin = io::stdin().lock();
            let mut buf = vec![0u8; 1 << 16];
            loop {
                let n = match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };
                input_crc.update(&buf[..n]);
                encoder.write_data(&buf[..n])?;
            }
        } else {
            let file = File::open(&args.input)?;
            if file.metadata()?.len() > 0 {
                // SAFETY: the mapping is read-only and dropped before returning
                let mmap = unsafe { Mmap::map(&file)? };
                input_crc.update(&mmap);
                encoder.write_data(&mmap)?;
            }
        }

        let input_bytes = encoder.total_in();
        let mut tally = encoder.finish()?;
        tally.flush()?;
        (input_bytes, input_crc.finalize(), tally.bytes)
    };
    let elapsed = start.elapsed();

    if args.verify {
        let decoder_config = DecoderConfig { deflate64: args.deflate64, ..Default::default() };
        let mut decoder = Decoder::new(&verify_copy[..], &decoder_config);
        let mut check = Tally::new(io::sink());
        io::copy(&mut decoder, &mut check)?;
        let decoded_crc = check.crc.finalize();
        if check.bytes != input_bytes || decoded_crc != input_crc {
            return Err(format!(
                "verification failed: input {} bytes crc {:08x}, decoded {} bytes crc {:08x}",
                input_bytes, input_crc, check.bytes, decoded_crc
            )
            .into());
        }
        if args.verbose {
            eprintln!("Verified: crc {:08x}", input_crc);
        }
    }

    if args.verbose {
        eprintln!("Compression complete:");
        eprintln!("  Input bytes:      {}", input_bytes);
        eprintln!("  Output bytes:     {}", output_bytes);
        if input_bytes > 0 {
            eprintln!("  Ratio:            {:.3}", output_bytes as f64 / input_bytes as f64);
        }
        eprintln!("  Time:             {:.2?}", elapsed);
        eprintln!(
            "  Throughput:       {:.1} MB/s",
            input_bytes as f64 / elapsed.as_secs_f64() / 1_000_000.0
        );
    }
    Ok(())
}

fn run_decompress(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let input: Box<dyn Read> = if is_stdio(&args.input) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(File::open(&args.input)?))
    };
    let config = DecoderConfig {
        expected_size: args.size,
        deflate64: args.deflate64,
        leave_open: false,
    };

    let start = Instant::now();
    let mut decoder = Decoder::new(input, &config);
    let mut output = Tally::new(open_output(&args.output)?);
    io::copy(&mut decoder, &mut output)?;
    output.flush()?;
    let elapsed = start.elapsed();

    if args.verbose {
        eprintln!("Decompression complete:");
        eprintln!("  Input bytes:      {}", decoder.total_in());
        eprintln!("  Output bytes:     {}", output.bytes);
        eprintln!("  CRC-32:           {:08x}", output.crc.finalize());
        eprintln!("  Time:             {:.2?}", elapsed);
        eprintln!(
            "  Throughput:       {:.1} MB/s",
            output.bytes as f64 / elapsed.as_secs_f64() / 1_000_000.0
        );
    }
    Ok(())
}

/// Writes everything to both writers
struct TeeWriter<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}
