//! xfrmctl spi command implementation.

use clap::{Args, Subcommand};
use serde::Serialize;
use xfrmctl::XfrmController;

use super::{OutputOptions, parse_u32, print_all};

#[derive(Args)]
pub struct SpiCmd {
    #[command(subcommand)]
    action: SpiAction,
}

#[derive(Subcommand)]
enum SpiAction {
    /// Reserve an SPI for an SA that is not installed yet.
    #[command(visible_alias = "alloc")]
    Allocate {
        /// Request id of the future SA.
        #[arg(long)]
        reqid: u32,

        /// Source address (empty for any).
        #[arg(long, default_value = "")]
        src: String,

        /// Destination address.
        #[arg(long)]
        dst: String,

        /// Reserve exactly this SPI instead of a random one.
        #[arg(long, value_parser = parse_u32)]
        spi: Option<u32>,
    },
}

#[derive(Serialize)]
struct Allocated {
    spi: u32,
}

impl SpiCmd {
    pub fn run(self, xfrm: &XfrmController, opts: &OutputOptions) -> anyhow::Result<()> {
        match self.action {
            SpiAction::Allocate {
                reqid,
                src,
                dst,
                spi,
            } => {
                let spi = xfrm.allocate_spi(reqid, &src, &dst, spi.unwrap_or(0))?;
                print_all(&[Allocated { spi }], opts, |w, a| {
                    writeln!(w, "0x{:08x}", a.spi)
                })
            }
        }
    }
}
