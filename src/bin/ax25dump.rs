/*! Dump AX.25 frames from a file of ASCII bits.

```no_run
$ ./ax25dump --permissive captured.bits
```

The input is a stream of `0`/`1` characters (any other byte, including
newlines, is skipped), matching the bitstream `HdlcFramer` consumes
directly from a demodulator in the library use case.
*/
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use ax25hdlc::hdlc::{FramerConfig, HdlcFramer};

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    #[arg(help = "File of ASCII '0'/'1' bits to decode")]
    input: PathBuf,

    #[arg(long, help = "Surface CRC-invalid frames instead of discarding them")]
    permissive: bool,

    #[arg(long, default_value = "2000", help = "Watchdog timeout in milliseconds")]
    watchdog_ms: u64,

    #[arg(long, help = "Emit one JSON object per frame instead of the human-readable format")]
    json: bool,

    #[arg(short = 'v', default_value = "0")]
    verbose: usize,
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("ax25hdlc")
        .quiet(false)
        .verbosity(opt.verbose)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let contents = fs::read(&opt.input).with_context(|| format!("reading {}", opt.input.display()))?;

    let config = FramerConfig { permissive: opt.permissive, watchdog_timeout: Duration::from_millis(opt.watchdog_ms) };
    let mut framer = HdlcFramer::new(config);

    for byte in contents {
        let bit = match byte {
            b'0' => 0,
            b'1' => 1,
            _ => continue,
        };
        if framer.push(bit) {
            while let Some(record) = framer.take() {
                if opt.json {
                    println!("{}", serde_json::to_string(&record)?);
                } else {
                    println!("{record}");
                }
            }
        }
    }
    Ok(())
}
