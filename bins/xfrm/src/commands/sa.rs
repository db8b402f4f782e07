//! xfrmctl sa command implementation.

use std::io::Write;

use clap::{Args, Subcommand, ValueEnum};
use xfrmctl::netlink::xfrm::{SecurityAssociation, XfrmAlgorithm};
use xfrmctl::{EncapType, Mode, SaId, SaParams, XfrmController};

use super::{AlgorithmArg, OutputOptions, parse_algorithm, parse_mark, parse_u32, print_all};

#[derive(Args)]
pub struct SaCmd {
    #[command(subcommand)]
    action: Option<SaAction>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Transport,
    Tunnel,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Transport => Mode::Transport,
            ModeArg::Tunnel => Mode::Tunnel,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EncapArg {
    /// ESP in UDP (RFC 3948).
    Espinudp,
    /// ESP in UDP with a non-IKE marker.
    EspinudpNonIke,
}

impl From<EncapArg> for EncapType {
    fn from(encap: EncapArg) -> Self {
        match encap {
            EncapArg::Espinudp => EncapType::EspInUdp,
            EncapArg::EspinudpNonIke => EncapType::EspInUdpNonIke,
        }
    }
}

/// Fields identifying an SA.
#[derive(Args)]
struct SaIdArgs {
    /// Request id shared with the matching policies.
    #[arg(long)]
    reqid: u32,

    /// Source address (empty for any).
    #[arg(long, default_value = "")]
    src: String,

    /// Destination address.
    #[arg(long)]
    dst: String,

    /// SPI (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_u32)]
    spi: u32,

    /// Mark as VALUE[/MASK] (VTI only).
    #[arg(long, value_parser = parse_mark)]
    mark: Option<(u32, u32)>,

    /// XFRM interface id.
    #[arg(long, default_value_t = 0)]
    if_id: u32,
}

#[derive(Subcommand)]
enum SaAction {
    /// List SAs.
    #[command(visible_alias = "ls", visible_alias = "show")]
    List,

    /// Add an SA, or replace the SA with the same identity.
    #[command(visible_alias = "update")]
    Add {
        #[command(flatten)]
        id: SaIdArgs,

        /// Transform mode.
        #[arg(long, value_enum, default_value_t = ModeArg::Transport)]
        mode: ModeArg,

        /// Underlying network id for the output mark (tunnel mode).
        #[arg(long, default_value_t = 0)]
        net_id: u32,

        /// Encryption as NAME:HEXKEY.
        #[arg(long, value_parser = parse_algorithm)]
        enc: Option<AlgorithmArg>,

        /// Authentication as NAME:HEXKEY:TRUNC_BITS.
        #[arg(long, value_parser = parse_algorithm)]
        auth: Option<AlgorithmArg>,

        /// AEAD as NAME:HEXKEY:ICV_BITS.
        #[arg(long, value_parser = parse_algorithm, conflicts_with_all = ["enc", "auth"])]
        aead: Option<AlgorithmArg>,

        /// UDP encapsulation (IPv4 only).
        #[arg(long, value_enum, requires_all = ["sport", "dport"])]
        encap: Option<EncapArg>,

        /// Local UDP encapsulation port.
        #[arg(long)]
        sport: Option<u16>,

        /// Remote UDP encapsulation port.
        #[arg(long)]
        dport: Option<u16>,
    },

    /// Delete an SA.
    #[command(visible_alias = "del")]
    Delete {
        #[command(flatten)]
        id: SaIdArgs,
    },
}

impl SaCmd {
    pub fn run(self, xfrm: &XfrmController, opts: &OutputOptions) -> anyhow::Result<()> {
        match self.action.unwrap_or(SaAction::List) {
            SaAction::List => {
                let sas = xfrm.security_associations()?;
                print_all(&sas, opts, print_sa)
            }
            SaAction::Add {
                id,
                mode,
                net_id,
                enc,
                auth,
                aead,
                encap,
                sport,
                dport,
            } => {
                let mut params = SaParams::new(id.reqid, Mode::from(mode), id.src, id.dst, id.spi)
                    .underlying_network(net_id)
                    .xfrm_if_id(id.if_id);
                if let Some((value, mask)) = id.mark {
                    params = params.mark(value, mask);
                }
                if let Some(enc) = enc {
                    params = params.crypt(enc.name, enc.key, enc.bits);
                }
                if let Some(auth) = auth {
                    params = params.auth(auth.name, auth.key, auth.bits);
                }
                if let Some(aead) = aead {
                    params = params.aead(aead.name, aead.key, aead.bits);
                }
                if let Some(encap) = encap {
                    params = params.encap(
                        EncapType::from(encap),
                        sport.unwrap_or_default(),
                        dport.unwrap_or_default(),
                    );
                }
                xfrm.add_or_update_security_association(&params)?;
                Ok(())
            }
            SaAction::Delete { id } => {
                let mut sa = SaId::new(id.reqid, id.src, id.dst, id.spi).xfrm_if_id(id.if_id);
                if let Some((value, mask)) = id.mark {
                    sa = sa.mark(value, mask);
                }
                xfrm.delete_security_association(&sa)?;
                Ok(())
            }
        }
    }
}

fn or_any(addr: Option<std::net::IpAddr>) -> String {
    addr.map_or_else(|| "any".to_string(), |a| a.to_string())
}

fn print_algorithm(
    w: &mut dyn Write,
    kind: &str,
    algo: Option<&XfrmAlgorithm>,
) -> std::io::Result<()> {
    if let Some(algo) = algo {
        write!(w, "\t{} {} ({} bits)", kind, algo.name, algo.key_len)?;
        if algo.trunc_len != 0 {
            write!(w, " {}", algo.trunc_len)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn print_sa(w: &mut dyn Write, sa: &SecurityAssociation) -> std::io::Result<()> {
    writeln!(w, "src {} dst {}", or_any(sa.src_addr), or_any(sa.dst_addr))?;
    writeln!(
        w,
        "\tproto {:?} spi 0x{:08x} reqid {} mode {:?}",
        sa.protocol, sa.spi, sa.reqid, sa.mode
    )?;
    writeln!(w, "\treplay-window {} flags 0x{:x}", sa.replay_window, sa.flags)?;
    print_algorithm(w, "enc", sa.enc_alg.as_ref())?;
    print_algorithm(w, "auth-trunc", sa.auth_alg.as_ref())?;
    print_algorithm(w, "aead", sa.aead_alg.as_ref())?;
    if let Some(encap) = &sa.encap {
        writeln!(
            w,
            "\tencap type {} sport {} dport {}",
            encap.encap_type, encap.src_port, encap.dst_port
        )?;
    }
    if let Some((value, mask)) = sa.mark {
        writeln!(w, "\tmark 0x{:x}/0x{:x}", value, mask)?;
    }
    if let Some(mark) = sa.output_mark {
        writeln!(w, "\toutput-mark 0x{:x}", mark)?;
    }
    if let Some(if_id) = sa.if_id {
        writeln!(w, "\tif_id 0x{:x}", if_id)?;
    }
    writeln!(w, "\tstats {} bytes {} packets", sa.bytes, sa.packets)
}
