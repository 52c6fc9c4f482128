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

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

#[macro_use]
extern crate bcomp;

use bcomp::boards;
use bcomp::catalogue::loader::{self, OpenOpts, WriteOpts};
use bcomp::common::parse_frequency;
use bcomp::exporter::*;
use bcomp::peripherals::ModelPeripherals;
use bcomp::soc::{compose, Composition, SocConfig};
#[allow(unused)]
use bcomp::log::*;

#[derive(Parser, Debug)]
#[clap(
    author = "Antmicro",
    version = "0.1.0",
    about = "BCOMP - Board resource binding and constraint COMPoser",
    long_about = None
)]
struct Args {
    #[clap(long, default_value = "hsrm_progenitor", help = "Built-in board description")]
    board: String,
    #[clap(long, help = "Hand the generated design over to the toolchain")]
    build: bool,
    #[clap(long, help = "Print the command loading the bitstream")]
    load: bool,
    #[clap(long, value_parser = parse_frequency, help = "System clock frequency (default: 100MHz)")]
    sys_clk_freq: Option<u64>,
    #[clap(long, help = "Enable SDCard support")]
    with_sdcard: bool,
    #[clap(long, help = "Enable the LED chaser")]
    with_led_chaser: bool,
    #[clap(long, help = "Number of Ethernet interfaces")]
    eth: Option<usize>,
    #[clap(long, help = "Size of integrated main RAM, 0 for external DRAM")]
    integrated_main_ram_size: Option<u64>,
    #[clap(long, help = "Pin catalogue replacing the board's built-in one (YAML)")]
    catalogue: Option<String>,
    #[clap(long, help = "Use raw (uncompressed) catalogue files")]
    raw: bool,
    #[clap(long, help = "Write the board's catalogue to a file and exit")]
    dump_catalogue: Option<String>,
    #[clap(long, help = "Composition config (YAML), overridden by flags")]
    config: Option<String>,
    #[clap(long, default_value = "build", help = "Directory for generated files")]
    output_dir: String,
    #[clap(long, help = "Name of generated files (default: board name)")]
    build_name: Option<String>,
    #[clap(
        long,
        help = "Composition parts to be exported to JSON (domains, bindings, constraints, peripherals or :all)"
    )]
    json: Option<Vec<String>>,
}

impl Args {
    fn soc_config(&self) -> Result<SocConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => SocConfig::open(path)?,
            None => SocConfig::default(),
        };
        if let Some(freq) = self.sys_clk_freq {
            config.sys_clk_freq = freq;
        }
        if let Some(eth) = self.eth {
            config.eth_count = eth;
        }
        if let Some(size) = self.integrated_main_ram_size {
            config.integrated_main_ram_size = size;
        }
        config.with_sdcard |= self.with_sdcard;
        config.with_led_chaser |= self.with_led_chaser;
        Ok(config)
    }
}

fn print_summary(composition: &Composition) {
    println!(concat!(
        "SoC on {} ({}, {}):\n",
        "    System clock:          {} Hz\n",
        "    Reset:                 {}\n",
        "    Clock domains:         {}\n",
        "    Claimed resources:     {}\n",
        "    Constraints:           {}"
        ),
        composition.board,
        composition.device,
        composition.toolchain,
        composition.sys_clk_freq,
        composition.reset,
        composition.domains.len(),
        composition.bindings.len(),
        composition.constraints.len()
    );
    for peripheral in &composition.peripherals {
        println!("    {:<22} {} bus, {} bits, domain {}",
            peripheral.name.clone() + ":",
            serde_json::to_value(peripheral.bus.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            peripheral.bus.data_width,
            peripheral.bus.domain
        );
    }
}

fn export(args: &Args, name: &str, composition: &Composition) -> std::io::Result<()> {
    let out = PathBuf::from(&args.output_dir);
    std::fs::create_dir_all(&out)?;

    let mut xdc_exporter = MultiFileExporter::new(&Some(vec![name.to_string()]), out.clone(), ".xdc");
    xdc_exporter.ignore_or_export(name, || render_xdc(composition))?;
    <MultiFileExporter as Exporter<String>>::flush(&mut xdc_exporter)?;

    /* serde::Serialize is not object-safe, so every part goes in as a JSON value */
    let mut json_exporter = CompoundJsonExporter::new(&args.json, out.join(format!("{}.json", name)));
    json_exporter.ignore_or_export("domains", || {
        serde_json::to_value(&composition.domains).unwrap_or_default()
    })?;
    json_exporter.ignore_or_export("bindings", || {
        serde_json::to_value(&composition.bindings).unwrap_or_default()
    })?;
    json_exporter.ignore_or_export("constraints", || {
        serde_json::to_value(&composition.constraints).unwrap_or_default()
    })?;
    json_exporter.ignore_or_export("peripherals", || {
        serde_json::to_value(&composition.peripherals).unwrap_or_default()
    })?;
    json_exporter.flush()
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut board = boards::builtin(&args.board).ok_or_else(|| format!(
        "unknown board \"{}\", available: {}",
        args.board,
        boards::builtin_names().join(", ")
    ))?;

    if let Some(path) = &args.catalogue {
        let catalogue = loader::open(path, OpenOpts { raw: args.raw })?;
        dbg_log!(DBG_INFO, "Loaded {} resources from {}", catalogue.len(), path);
        board = board.with_catalogue(catalogue);
    }

    if let Some(path) = &args.dump_catalogue {
        loader::write(path, &board.catalogue, WriteOpts { raw: args.raw, compresion_level: 6 })?;
        println!("Wrote {} resources to {}", board.catalogue.len(), path);
        return Ok(());
    }

    let config = args.soc_config()?;
    let composition = compose(&board, &config, &mut ModelPeripherals)?;
    print_summary(&composition);

    let name = args.build_name.clone().unwrap_or_else(|| board.name.clone());
    export(&args, &name, &composition)?;

    let out = PathBuf::from(&args.output_dir);
    if args.build {
        println!("Design ready for {} ({}): {}",
            board.toolchain, board.device, out.join(format!("{}.xdc", name)).display());
    }

    if args.load {
        let programmer = board.programmer.as_ref()
            .ok_or_else(|| format!("board {} has no programmer", board.name))?;
        let bitstream = out.join("gateware").join(format!("{}.bit", name));
        println!("{}", programmer.load_command(&bitstream).join(" "));
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "bcomp", "--sys-clk-freq", "125e6", "--eth", "2", "--with-sdcard",
            "--json", ":all",
        ]).unwrap();
        assert_eq!(args.board, "hsrm_progenitor");
        assert_eq!(args.output_dir, "build");
        assert_eq!(args.json, Some(vec![":all".to_string()]));

        let config = args.soc_config().unwrap();
        assert_eq!(config.sys_clk_freq, 125_000_000);
        assert_eq!(config.eth_count, 2);
        assert!(config.with_sdcard);
        assert!(!config.with_led_chaser);

        assert!(Args::try_parse_from(["bcomp", "--sys-clk-freq", "1.5"]).is_err());
    }
}
