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

//! Reading and writing pin catalogues as YAML.
//!
//! The on-disk layout mirrors the way pin tables are usually written by hand:
//!
//! ```yaml
//! - name: clk0
//!   index: 0
//!   subsignals:
//!     - { name: p, pins: H4, attributes: [ { io_standard: DIFF_SSTL15 } ] }
//!     - { name: n, pins: G4, attributes: [ { io_standard: DIFF_SSTL15 } ] }
//! - name: cpu_reset
//!   index: 0
//!   pins: T3
//!   attributes: [ { io_standard: SSTL15 } ]
//! ```

use std::path::Path;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use memmap2::Mmap;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Serialize, Deserialize};

use super::*;

#[derive(Debug, Clone)]
pub enum LoadError {
    CantOpenFile(String),
    YamlError(String),
    MalformedResource(String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CantOpenFile(e) => write!(f, "can't open file: {}", e),
            Self::YamlError(e) => write!(f, "invalid YAML: {}", e),
            Self::MalformedResource(e) => write!(f, "malformed resource: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

pub struct OpenOpts {
    pub raw: bool,
}

pub struct WriteOpts {
    pub raw: bool,
    pub compresion_level: u32
}

impl Default for OpenOpts {
    fn default() -> Self {
        Self {
            raw: false
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SubsignalDecl {
    name: String,
    pins: String,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        with = "serde_yaml::with::singleton_map_recursive"
    )]
    attributes: Vec<Attribute>,
}

#[derive(Serialize, Deserialize)]
struct ResourceDecl {
    name: String,
    index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pins: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    subsignals: Vec<SubsignalDecl>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        with = "serde_yaml::with::singleton_map_recursive"
    )]
    attributes: Vec<Attribute>,
}

impl TryFrom<ResourceDecl> for ResourceSpec {
    type Error = LoadError;

    fn try_from(decl: ResourceDecl) -> Result<Self, Self::Error> {
        let signals = match (decl.pins, decl.subsignals.is_empty()) {
            (Some(pins), true) => Signals::Flat(PinGroup::new(&pins)),
            (None, false) => Signals::Subsignals(
                decl.subsignals.into_iter()
                    .map(|s| Subsignal {
                        name: s.name,
                        group: PinGroup {
                            pins: PinGroup::new(&s.pins).pins,
                            attributes: s.attributes
                        },
                    })
                    .collect()
            ),
            (Some(_), false) => return Err(LoadError::MalformedResource(format!(
                "{}:{} has both `pins` and `subsignals`", decl.name, decl.index
            ))),
            (None, true) => return Err(LoadError::MalformedResource(format!(
                "{}:{} has neither `pins` nor `subsignals`", decl.name, decl.index
            ))),
        };

        Ok(ResourceSpec {
            name: decl.name,
            index: decl.index,
            signals,
            attributes: decl.attributes,
        })
    }
}

impl From<&ResourceSpec> for ResourceDecl {
    fn from(spec: &ResourceSpec) -> Self {
        let (pins, subsignals) = match &spec.signals {
            Signals::Flat(group) => (Some(group.pins.join(" ")), Vec::new()),
            Signals::Subsignals(subsignals) => (
                None,
                subsignals.iter()
                    .map(|s| SubsignalDecl {
                        name: s.name.clone(),
                        pins: s.group.pins.join(" "),
                        attributes: s.group.attributes.clone(),
                    })
                    .collect()
            ),
        };

        /* Attributes of a flat group are folded into the resource, the YAML
         * layout has no place for them otherwise. */
        let mut attributes = spec.attributes.clone();
        if let Signals::Flat(group) = &spec.signals {
            attributes.extend(group.attributes.iter().cloned());
        }

        Self { name: spec.name.clone(), index: spec.index, pins, subsignals, attributes }
    }
}

fn decls_to_catalogue(decls: Vec<ResourceDecl>) -> Result<Catalogue, LoadError> {
    let resources = decls.into_iter()
        .map(ResourceSpec::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Catalogue::from(resources))
}

pub fn parse_str(yaml: &str) -> Result<Catalogue, LoadError> {
    let decls: Vec<ResourceDecl> = serde_yaml::from_str(yaml)
        .map_err(|e| LoadError::YamlError(format!("{}", e)))?;
    decls_to_catalogue(decls)
}

pub fn to_string(catalogue: &Catalogue) -> Result<String, LoadError> {
    let decls: Vec<ResourceDecl> = catalogue.iter().map(ResourceDecl::from).collect();
    serde_yaml::to_string(&decls)
        .map_err(|e| LoadError::YamlError(format!("{}", e)))
}

pub fn open<P>(path: P, opts: OpenOpts) -> Result<Catalogue, LoadError> where
    P: AsRef<Path>,
{
    let catalogue_file = File::open(path)
        .map_err(|e| LoadError::CantOpenFile(format!("{:?}", e)))?;

    /* RAW mode maps a plain YAML file, the default expects a gzip-compressed one */
    let decls: Vec<ResourceDecl> = if opts.raw {
        /* UNSAFE DUE TO A POTENTIAL UB WHEN A FILE IS CHANGED! */
        let mmapped = unsafe { Mmap::map(&catalogue_file) }
            .map_err(|e| LoadError::CantOpenFile(format!("mmap failed: {:?}", e)))?;
        serde_yaml::from_slice(&mmapped)
            .map_err(|e| LoadError::YamlError(format!("{}", e)))?
    } else {
        let d = BufReader::new(GzDecoder::new(catalogue_file));
        serde_yaml::from_reader(d)
            .map_err(|e| LoadError::YamlError(format!("{}", e)))?
    };

    decls_to_catalogue(decls)
}

pub fn write<P>(path: P, catalogue: &Catalogue, opts: WriteOpts)
    -> Result<(), LoadError> where P: AsRef<Path>
{
    let catalogue_file = File::create(path)
        .map_err(|e| LoadError::CantOpenFile(format!("{:?}", e)))?;
    let yaml = to_string(catalogue)?;

    let result = if opts.raw {
        let mut w = BufWriter::new(catalogue_file);
        w.write_all(yaml.as_bytes()).and_then(|_| w.flush())
    } else {
        let mut e = GzEncoder::new(catalogue_file, Compression::new(opts.compresion_level));
        e.write_all(yaml.as_bytes()).and_then(|_| e.finish().map(|_| ()))
    };

    result.map_err(|e| LoadError::CantOpenFile(format!("write failed: {:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
- name: clk0
  index: 0
  subsignals:
    - { name: p, pins: H4, attributes: [ { io_standard: DIFF_SSTL15 } ] }
    - { name: n, pins: G4, attributes: [ { io_standard: DIFF_SSTL15 } ] }
- name: user_led
  index: 1
  pins: R18
  attributes: [ { io_standard: LVCMOS33 }, { slew: fast } ]
"#;

    #[test]
    fn test_parse_catalogue() {
        let catalogue = parse_str(SAMPLE).unwrap();
        assert_eq!(catalogue.len(), 2);

        let clk = catalogue.iter().next().unwrap();
        assert_eq!(clk.name, "clk0");
        assert_eq!(clk.channel_names().collect::<Vec<_>>(), vec!["p", "n"]);
        assert_eq!(clk.channel("p").unwrap().pins, vec!["H4".to_string()]);

        let led = catalogue.iter().nth(1).unwrap();
        assert_eq!(led.index, 1);
        assert_eq!(led.attributes, vec![io_standard("LVCMOS33"), Attribute::Slew(Slew::Fast)]);
    }

    #[test]
    fn test_reject_ambiguous_declaration() {
        let yaml = "- { name: x, index: 0, pins: A1, subsignals: [ { name: a, pins: B1 } ] }";
        assert!(matches!(parse_str(yaml), Err(LoadError::MalformedResource(_))));

        let yaml = "- { name: x, index: 0 }";
        assert!(matches!(parse_str(yaml), Err(LoadError::MalformedResource(_))));
    }

    #[test]
    fn test_yaml_text_survives_rewrite() {
        let catalogue = parse_str(SAMPLE).unwrap();
        let again = parse_str(&to_string(&catalogue).unwrap()).unwrap();
        assert_eq!(catalogue, again);
    }

    #[test]
    fn test_catalogue_files() {
        let board = crate::boards::hsrm_progenitor::board();
        let dir = std::env::temp_dir().join(format!("bcomp-catalogue-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        for raw in [false, true] {
            let path = dir.join(if raw { "board.yaml" } else { "board.yaml.gz" });
            write(&path, &board.catalogue, WriteOpts { raw, compresion_level: 6 }).unwrap();
            let loaded = open(&path, OpenOpts { raw }).unwrap();
            assert_eq!(loaded, board.catalogue, "raw: {}", raw);
        }

        /* Compressed input is not valid YAML */
        let gz = dir.join("board.yaml.gz");
        assert!(matches!(open(&gz, OpenOpts { raw: true }), Err(LoadError::YamlError(_))));
        assert!(matches!(
            open(dir.join("missing.yaml"), OpenOpts { raw: true }),
            Err(LoadError::CantOpenFile(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
