/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::path::Path;

use crate::catalogue::Catalogue;
use crate::constraints::{CommandTemplate, ConstraintSet};
use crate::registry::ResourceRegistry;

pub mod hsrm_progenitor;

#[cfg(test)]
mod tests;

/// Adds board-specific constraints once every peripheral has claimed its
/// resources. Only sees the registry through its read-only methods.
pub type FinalizeHook = fn(&ResourceRegistry, &mut ConstraintSet);

/// JTAG programmer of a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOcd {
    pub config: String,
    /// Proxy bitstream used to reach the configuration flash over JTAG
    pub flash_proxy: String,
}

impl OpenOcd {
    pub fn new(config: &str, flash_proxy: &str) -> Self {
        Self { config: config.to_string(), flash_proxy: flash_proxy.to_string() }
    }

    /// Command line loading `bitstream` into the FPGA. Never executed here.
    pub fn load_command(&self, bitstream: &Path) -> Vec<String> {
        let script = ["init", &format!("pld load 0 {{{}}}", bitstream.display()), "exit"];
        vec![
            "openocd".to_string(),
            "-f".to_string(),
            self.config.clone(),
            "-c".to_string(),
            script.join("; "),
        ]
    }
}

/// Everything the composition needs to know about a board.
#[derive(Debug, Clone)]
pub struct Board {
    pub name: String,
    pub device: String,
    pub toolchain: String,
    pub default_clk_name: String,
    pub default_clk_freq: u64,
    pub reset_name: String,
    pub catalogue: Catalogue,
    pub platform_commands: Vec<CommandTemplate>,
    pub finalize_hook: Option<FinalizeHook>,
    pub programmer: Option<OpenOcd>,
}

impl Board {
    /// A board described by nothing but its pin table. Clock and reset
    /// resources default to `clk0` and `cpu_reset`.
    pub fn generic(name: &str, catalogue: Catalogue, clk_freq: u64) -> Self {
        Self {
            name: name.to_string(),
            device: String::new(),
            toolchain: String::new(),
            default_clk_name: "clk0".to_string(),
            default_clk_freq: clk_freq,
            reset_name: "cpu_reset".to_string(),
            catalogue,
            platform_commands: Vec::new(),
            finalize_hook: None,
            programmer: None,
        }
    }

    /// Replaces the pin table, keeping everything else.
    pub fn with_catalogue(mut self, catalogue: Catalogue) -> Self {
        self.catalogue = catalogue;
        self
    }
}

/// Looks up a built-in board by name.
pub fn builtin(name: &str) -> Option<Board> {
    match name {
        hsrm_progenitor::NAME => Some(hsrm_progenitor::board()),
        _ => None,
    }
}

pub fn builtin_names() -> &'static [&'static str] {
    &[hsrm_progenitor::NAME]
}
