use anyhow::Result;

use crate::config::ConsoleConfig;

#[derive(Clone, Debug, Default)]
pub struct TuiRunOptions {
    pub config: ConsoleConfig,
    /// Skip the push channel (views then refresh only on explicit reloads).
    pub offline: bool,
}

pub fn run(opts: TuiRunOptions) -> Result<()> {
    crate::tui_shell::run(opts)
}
