//! xfrmctl command implementations.

pub mod policy;
pub mod sa;
pub mod spi;
pub mod tunnel;

use std::io::Write;

use serde::Serialize;
use xfrmctl::XfrmController;

/// Output selection shared by all commands.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub pretty: bool,
}

/// Print records as JSON or through `text`, one record at a time.
pub fn print_all<T, F>(records: &[T], opts: &OutputOptions, mut text: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnMut(&mut dyn Write, &T) -> std::io::Result<()>,
{
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if opts.json {
        print_json(&mut out, records, opts)?;
    } else {
        for record in records {
            text(&mut out, record)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(
    out: &mut dyn Write,
    value: &T,
    opts: &OutputOptions,
) -> anyhow::Result<()> {
    if opts.pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

#[derive(Serialize)]
struct Status<'a> {
    xfrm_interfaces: bool,
    interface_prefix: &'a str,
    spi_min: u32,
    spi_max: u32,
}

/// Print the controller status report.
pub fn print_status(xfrm: &XfrmController, opts: &OutputOptions) -> anyhow::Result<()> {
    if opts.json {
        let config = xfrm.config();
        let status = Status {
            xfrm_interfaces: xfrm.xfrm_interface_supported(),
            interface_prefix: &config.interface_prefix,
            spi_min: config.spi_min,
            spi_max: config.spi_max,
        };
        return print_json(&mut std::io::stdout().lock(), &status, opts);
    }

    let mut report = String::new();
    xfrm.dump(&mut report)?;
    print!("{}", report);
    Ok(())
}

/// Parse a hex string, with or without a `0x` prefix.
pub fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {:?}", s));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex key {:?}", s))
        })
        .collect()
}

/// Parse a decimal or `0x`-prefixed hex number.
pub fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number {:?}: {}", s, e))
}

/// Parse `VALUE[/MASK]`; the mask defaults to all ones.
pub fn parse_mark(s: &str) -> Result<(u32, u32), String> {
    match s.split_once('/') {
        Some((value, mask)) => Ok((parse_u32(value)?, parse_u32(mask)?)),
        None => Ok((parse_u32(s)?, u32::MAX)),
    }
}

/// An algorithm given as `NAME:HEXKEY[:BITS]`.
#[derive(Debug, Clone)]
pub struct AlgorithmArg {
    pub name: String,
    pub key: Vec<u8>,
    pub bits: u32,
}

/// Parse `NAME:HEXKEY[:BITS]`.
pub fn parse_algorithm(s: &str) -> Result<AlgorithmArg, String> {
    let mut parts = s.splitn(3, ':');
    let name = parts.next().unwrap_or_default();
    let key = parts
        .next()
        .ok_or_else(|| format!("expected NAME:HEXKEY[:BITS], got {:?}", s))?;
    if name.is_empty() {
        return Err(format!("missing algorithm name in {:?}", s));
    }
    let bits = match parts.next() {
        Some(bits) => bits
            .parse()
            .map_err(|_| format!("invalid bit length in {:?}", s))?,
        None => 0,
    };
    Ok(AlgorithmArg {
        name: name.to_string(),
        key: parse_hex(key)?,
        bits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0x0a0B").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(parse_hex("ff00").unwrap(), vec![0xff, 0x00]);
        assert!(parse_hex("").unwrap().is_empty());
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_parse_mark() {
        assert_eq!(parse_mark("0x10/0xff").unwrap(), (0x10, 0xff));
        assert_eq!(parse_mark("7").unwrap(), (7, u32::MAX));
        assert!(parse_mark("x/1").is_err());
    }

    #[test]
    fn test_parse_algorithm() {
        let algo = parse_algorithm("hmac(sha256):0x0102:128").unwrap();
        assert_eq!(algo.name, "hmac(sha256)");
        assert_eq!(algo.key, vec![1, 2]);
        assert_eq!(algo.bits, 128);

        let algo = parse_algorithm("cbc(aes):00112233").unwrap();
        assert_eq!(algo.bits, 0);

        assert!(parse_algorithm("cbc(aes)").is_err());
        assert!(parse_algorithm(":00").is_err());
        assert!(parse_algorithm("x:00:big").is_err());
    }
}
