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

use std::path::{Path, PathBuf};
use std::fs::File;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::catalogue::{Attribute, Pull, Slew};
use crate::constraints::{Directive, Target};
use crate::registry::BoundSignal;
use crate::soc::Composition;


pub trait AsBytes {
    fn as_bytes<'s>(&'s self) -> &'s [u8];
}

impl AsBytes for String {
    fn as_bytes<'s>(&'s self) -> &'s [u8] {
        String::as_bytes(self)
    }
}

impl AsBytes for str {
    fn as_bytes<'s>(&'s self) -> &'s [u8] {
        str::as_bytes(self)
    }
}

/// Artifact selection. `:all` selects everything, no list selects nothing.
#[derive(Default)]
struct ExportChecker {
    export: HashSet<String>,
    export_all: bool,
}

impl ExportChecker {
    fn new(arg_list: &Option<Vec<String>>) -> Self {
        let mut checker = Self::default();
        if let Some(args) = arg_list {
            for arg in args {
                if arg == ":all" {
                    checker.export_all = true;
                } else {
                    checker.export.insert(arg.clone());
                }
            }
        }
        checker
    }

    fn should_export(&self, name: &str) -> bool {
        self.export_all || self.export.contains(name)
    }
}

pub trait Exporter<D> {
    fn ignore_or_export<'s, F>(&'s mut self, name: &str, exporter: F)
        -> std::io::Result<()>
    where
        F: FnOnce() -> D + 's;

    fn flush(&mut self) -> std::io::Result<()>;
}

/// Writes every artifact to its own `<prefix>/<name><suffix>` file.
pub struct MultiFileExporter {
    prefix: PathBuf,
    suffix: String,
    checker: ExportChecker,
}

impl MultiFileExporter {
    pub fn new(arg_list: &Option<Vec<String>>, prefix: PathBuf, suffix: &str) -> Self {
        Self { prefix, suffix: suffix.to_string(), checker: ExportChecker::new(arg_list) }
    }
}

impl<D> Exporter<D> for MultiFileExporter where D: AsBytes {
    fn ignore_or_export<'s, F>(&'s mut self, name: &str, exporter: F)
        -> std::io::Result<()>
    where
        F: FnOnce() -> D + 's
    {
        if self.checker.should_export(name) {
            let data = exporter();
            let path = self.prefix.join(Path::new(&(name.to_string() + &self.suffix)));
            let mut file = File::create(path)?;
            return file.write_all(data.as_bytes());
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Collects artifacts and writes them as one JSON object on `flush`.
pub struct CompoundJsonExporter<D> where D: Serialize {
    filename: PathBuf,
    data: BTreeMap<String, D>,
    checker: ExportChecker,
}

impl<D> CompoundJsonExporter<D> where D: Serialize {
    pub fn new(arg_list: &Option<Vec<String>>, filename: PathBuf) -> Self {
        Self {
            filename,
            data: BTreeMap::new(),
            checker: ExportChecker::new(arg_list),
        }
    }
}

impl<D> Exporter<D> for CompoundJsonExporter<D> where D: Serialize {
    fn ignore_or_export<'s, F>(&'s mut self, name: &str, exporter: F)
        -> std::io::Result<()>
    where
        F: FnOnce() -> D + 's
    {
        if self.checker.should_export(name) {
            let data = exporter();
            self.data.insert(name.into(), data);
        }
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        let data = serde_json::to_string_pretty(&self.data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(&self.filename)?;
        file.write_all(data.as_bytes())
    }
}

/* XDC rendering */

fn property(attribute: &Attribute) -> (String, String) {
    match attribute {
        Attribute::IoStandard(standard) => ("IOSTANDARD".into(), standard.clone()),
        Attribute::Slew(Slew::Fast) => ("SLEW".into(), "FAST".into()),
        Attribute::Slew(Slew::Slow) => ("SLEW".into(), "SLOW".into()),
        Attribute::Drive(ma) => ("DRIVE".into(), ma.to_string()),
        Attribute::Pull(Pull::Up) => ("PULLUP".into(), "TRUE".into()),
        Attribute::Pull(Pull::Down) => ("PULLDOWN".into(), "TRUE".into()),
        Attribute::Pull(Pull::Keeper) => ("KEEPER".into(), "TRUE".into()),
        Attribute::Termination(term) => ("IN_TERM".into(), term.clone()),
        Attribute::Misc(misc) => {
            let (key, value) = misc.split_once('=')
                .or_else(|| misc.split_once(' '))
                .unwrap_or((misc.as_str(), "TRUE"));
            (key.trim().to_string(), value.trim().to_string())
        },
    }
}

fn port_refs(signal: &BoundSignal) -> Vec<String> {
    match signal.pins.len() {
        1 => vec![signal.port.clone()],
        _ => (0 .. signal.pins.len()).map(|i| format!("{}[{}]", signal.port, i)).collect(),
    }
}

fn clock_net(target: &Target) -> String {
    match target {
        Target::Domain(domain) => format!("[get_nets {}_clk]", domain),
        Target::Port(port) => format!("[get_ports {{{}}}]", port),
    }
}

fn clock_name(target: &Target) -> String {
    match target {
        Target::Domain(domain) => format!("{}_clk", domain),
        Target::Port(port) => port.clone(),
    }
}

/// Renders a composition as a Vivado constraint file: pin placement and
/// electrical properties of every claimed binding, then timing constraints
/// and platform commands in registration order.
pub fn render_xdc(composition: &Composition) -> String {
    let mut xdc = String::new();

    /* Writing to a String can't fail */
    let _ = writeln!(xdc, "# {} ({})", composition.board, composition.device);
    let _ = writeln!(xdc, "\n################ IO constraints ################");
    for binding in &composition.bindings {
        let _ = writeln!(xdc, "\n## {}", binding);
        for signal in &binding.signals {
            for (pin, port) in signal.pins.iter().zip(port_refs(signal)) {
                let _ = writeln!(xdc, "set_property LOC {} [get_ports {{{}}}]", pin, port);
                for attribute in &signal.attributes {
                    let (key, value) = property(attribute);
                    let _ = writeln!(xdc, "set_property {} {} [get_ports {{{}}}]", key, value, port);
                }
            }
        }
    }

    let _ = writeln!(xdc, "\n################ Design constraints ################\n");
    for constraint in &composition.constraints {
        match (&constraint.target, &constraint.directive) {
            (Some(target), Directive::Period(period)) => {
                let _ = writeln!(xdc, "create_clock -name {} -period {} {}",
                    clock_name(target), period, clock_net(target));
            },
            (Some(from), Directive::FalsePath { to }) => {
                let _ = writeln!(xdc,
                    "set_clock_groups -group [get_clocks -include_generated_clocks -of {}] \
                     -group [get_clocks -include_generated_clocks -of {}] -asynchronous",
                    clock_net(from), clock_net(to));
            },
            (_, Directive::PlatformCommand(command)) => {
                let _ = writeln!(xdc, "{}", command);
            },
            (None, _) => (),
        }
    }

    xdc
}
