//! xfrmctl tunnel command implementation.
//!
//! With XFRM interface support only the name and `--if-id` matter; VTI
//! devices are built from the endpoints and keys.

use clap::{Args, Subcommand};
use xfrmctl::{TunnelParams, XfrmController};

#[derive(Args)]
pub struct TunnelCmd {
    #[command(subcommand)]
    action: TunnelAction,
}

#[derive(Args)]
struct TunnelArgs {
    /// Interface name.
    name: String,

    /// XFRM interface id.
    #[arg(long, default_value_t = 0)]
    if_id: u32,

    /// Local endpoint address (VTI).
    #[arg(long, default_value = "")]
    local: String,

    /// Remote endpoint address (VTI).
    #[arg(long, default_value = "")]
    remote: String,

    /// Input key (VTI).
    #[arg(long, default_value_t = 0)]
    ikey: u32,

    /// Output key (VTI).
    #[arg(long, default_value_t = 0)]
    okey: u32,
}

impl TunnelArgs {
    fn params(&self) -> TunnelParams {
        TunnelParams::new(self.name.as_str(), self.if_id)
            .endpoints(self.local.as_str(), self.remote.as_str())
            .keys(self.ikey, self.okey)
    }
}

#[derive(Subcommand)]
enum TunnelAction {
    /// Create a tunnel interface.
    Add(TunnelArgs),

    /// Modify an existing tunnel interface.
    #[command(visible_alias = "change")]
    Update(TunnelArgs),

    /// Delete a tunnel interface.
    #[command(visible_alias = "del")]
    Delete {
        /// Interface name.
        name: String,
    },
}

impl TunnelCmd {
    pub fn run(self, xfrm: &XfrmController) -> anyhow::Result<()> {
        match self.action {
            TunnelAction::Add(args) => xfrm.add_or_update_tunnel_interface(&args.params(), false)?,
            TunnelAction::Update(args) => {
                xfrm.add_or_update_tunnel_interface(&args.params(), true)?
            }
            TunnelAction::Delete { name } => xfrm.remove_tunnel_interface(&name)?,
        }
        Ok(())
    }
}
