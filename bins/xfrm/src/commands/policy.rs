//! xfrmctl policy command implementation.

use std::io::Write;

use clap::{Args, Subcommand, ValueEnum};
use xfrmctl::netlink::xfrm::SecurityPolicy;
use xfrmctl::{AddressFamily, Direction, PolicyParams, XfrmController};

use super::{OutputOptions, parse_mark, parse_u32, print_all};

#[derive(Args)]
pub struct PolicyCmd {
    #[command(subcommand)]
    action: Option<PolicyAction>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FamilyArg {
    Inet,
    Inet6,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirArg {
    In,
    Out,
    Fwd,
}

/// Fields of a tunnel-mode policy.
#[derive(Args)]
struct PolicyArgs {
    /// Request id of the SA the template points at.
    #[arg(long)]
    reqid: u32,

    /// Family of the protected traffic.
    #[arg(long, value_enum)]
    family: FamilyArg,

    /// Traffic direction.
    #[arg(long, value_enum)]
    dir: DirArg,

    /// Template source address (ignored by delete).
    #[arg(long, default_value = "")]
    src: String,

    /// Template destination address (ignored by delete).
    #[arg(long, default_value = "")]
    dst: String,

    /// Template SPI (ignored by delete).
    #[arg(long, value_parser = parse_u32, default_value = "0")]
    spi: u32,

    /// Mark as VALUE[/MASK] (VTI only).
    #[arg(long, value_parser = parse_mark)]
    mark: Option<(u32, u32)>,

    /// XFRM interface id.
    #[arg(long, default_value_t = 0)]
    if_id: u32,
}

impl PolicyArgs {
    fn params(&self) -> PolicyParams {
        let family = match self.family {
            FamilyArg::Inet => AddressFamily::Inet,
            FamilyArg::Inet6 => AddressFamily::Inet6,
        };
        let direction = match self.dir {
            DirArg::In => Direction::In,
            DirArg::Out => Direction::Out,
            DirArg::Fwd => Direction::Fwd,
        };
        let mut params = PolicyParams::new(self.reqid, family, direction)
            .template(self.src.as_str(), self.dst.as_str(), self.spi)
            .xfrm_if_id(self.if_id);
        if let Some((value, mask)) = self.mark {
            params = params.mark(value, mask);
        }
        params
    }
}

#[derive(Subcommand)]
enum PolicyAction {
    /// List policies.
    #[command(visible_alias = "ls", visible_alias = "show")]
    List,

    /// Add a policy.
    Add(PolicyArgs),

    /// Replace a policy.
    Update(PolicyArgs),

    /// Delete a policy.
    #[command(visible_alias = "del")]
    Delete(PolicyArgs),
}

impl PolicyCmd {
    pub fn run(self, xfrm: &XfrmController, opts: &OutputOptions) -> anyhow::Result<()> {
        match self.action.unwrap_or(PolicyAction::List) {
            PolicyAction::List => {
                let policies = xfrm.security_policies()?;
                return print_all(&policies, opts, print_policy);
            }
            PolicyAction::Add(args) => xfrm.add_security_policy(&args.params())?,
            PolicyAction::Update(args) => xfrm.update_security_policy(&args.params())?,
            PolicyAction::Delete(args) => xfrm.delete_security_policy(&args.params())?,
        }
        Ok(())
    }
}

fn print_policy(w: &mut dyn Write, policy: &SecurityPolicy) -> std::io::Result<()> {
    let sel = &policy.selector;
    let addr = |a: Option<std::net::IpAddr>, len: u8| {
        a.map_or_else(|| "any".to_string(), |a| format!("{}/{}", a, len))
    };
    writeln!(
        w,
        "src {} dst {}",
        addr(sel.src_addr, sel.src_prefix_len),
        addr(sel.dst_addr, sel.dst_prefix_len)
    )?;
    writeln!(
        w,
        "\tdir {:?} priority {} action {:?} index {}",
        policy.direction, policy.priority, policy.action, policy.index
    )?;
    for reqid in &policy.template_reqids {
        writeln!(w, "\ttmpl proto esp reqid {}", reqid)?;
    }
    if let Some((value, mask)) = policy.mark {
        writeln!(w, "\tmark 0x{:x}/0x{:x}", value, mask)?;
    }
    if let Some(if_id) = policy.if_id {
        writeln!(w, "\tif_id 0x{:x}", if_id)?;
    }
    Ok(())
}
