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

use serde::{Serialize, Deserialize};

pub mod loader;

#[cfg(test)]
mod tests;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slew {
    Slow,
    Fast,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pull {
    Up,
    Down,
    Keeper,
}

/// Electrical/physical directive attached to a pin group or to a whole
/// resource. Attributes are additive: nothing overrides anything, so two
/// conflicting standards on the same pin end up both in the output.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    IoStandard(String),
    Slew(Slew),
    /// Drive strength in mA
    Drive(u32),
    Pull(Pull),
    Termination(String),
    /// Free-form vendor property, either `KEY=VALUE` or `KEY VALUE`
    Misc(String),
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct PinGroup {
    /* Order matters: position in this list is the bit index within the bus */
    pub pins: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

impl PinGroup {
    /// Creates a pin group out of a whitespace-separated pin list, eg. `"J1 P6 N5"`
    pub fn new(pins: &str) -> Self {
        Self {
            pins: pins.split_whitespace().map(str::to_string).collect(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Subsignal {
    pub name: String,
    pub group: PinGroup,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signals {
    /// A plain pin list, eg. a single LED
    Flat(PinGroup),
    /// Named sub-channels, kept in declaration order
    Subsignals(Vec<Subsignal>),
}

/// A named, indexed hardware resource of a board.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    pub index: u32,
    pub signals: Signals,
    pub attributes: Vec<Attribute>,
}

impl ResourceSpec {
    pub fn pins(name: &str, index: u32, pins: &str) -> Self {
        Self {
            name: name.to_string(),
            index,
            signals: Signals::Flat(PinGroup::new(pins)),
            attributes: Vec::new(),
        }
    }

    pub fn composite(name: &str, index: u32) -> Self {
        Self {
            name: name.to_string(),
            index,
            signals: Signals::Subsignals(Vec::new()),
            attributes: Vec::new(),
        }
    }

    /// Appends a sub-channel. Only valid on resources created with `composite`,
    /// plain pin lists are left untouched.
    pub fn subsignal(mut self, name: &str, group: PinGroup) -> Self {
        debug_assert!(
            matches!(self.signals, Signals::Subsignals(_)),
            "Resource {}:{} has no sub-channels (adding \"{}\")",
            self.name, self.index, name
        );
        if let Signals::Subsignals(subsignals) = &mut self.signals {
            subsignals.push(Subsignal { name: name.to_string(), group });
        }
        self
    }

    pub fn attr(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn channel<'s>(&'s self, name: &str) -> Option<&'s PinGroup> {
        match &self.signals {
            Signals::Flat(_) => None,
            Signals::Subsignals(subsignals) => subsignals.iter()
                .find(|s| s.name == name)
                .map(|s| &s.group),
        }
    }

    pub fn channel_names<'s>(&'s self) -> impl Iterator<Item = &'s str> + 's {
        let subsignals: &'s [Subsignal] = match &self.signals {
            Signals::Flat(_) => &[],
            Signals::Subsignals(subsignals) => subsignals,
        };
        subsignals.iter().map(|s| s.name.as_str())
    }

    /// Every pin of the resource, channel by channel, in declaration order.
    pub fn all_pins<'s>(&'s self) -> Box<dyn Iterator<Item = &'s str> + 's> {
        match &self.signals {
            Signals::Flat(group) => Box::new(group.pins.iter().map(String::as_str)),
            Signals::Subsignals(subsignals) => Box::new(
                subsignals.iter()
                    .flat_map(|s| s.group.pins.iter().map(String::as_str))
            ),
        }
    }
}

impl std::fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.index)
    }
}

/// Ordered list of resource declarations. Pure data: duplicate detection
/// happens when the catalogue is declared into a registry.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Catalogue {
    resources: Vec<ResourceSpec>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, spec: ResourceSpec) {
        self.resources.push(spec);
    }

    pub fn with(mut self, spec: ResourceSpec) -> Self {
        self.push(spec);
        self
    }

    pub fn iter<'s>(&'s self) -> std::slice::Iter<'s, ResourceSpec> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl From<Vec<ResourceSpec>> for Catalogue {
    fn from(resources: Vec<ResourceSpec>) -> Self {
        Self { resources }
    }
}

impl<'c> IntoIterator for &'c Catalogue {
    type Item = &'c ResourceSpec;
    type IntoIter = std::slice::Iter<'c, ResourceSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}

/* Shorthands for writing pin tables */

pub fn io_standard(standard: &str) -> Attribute {
    Attribute::IoStandard(standard.to_string())
}

pub fn misc(property: &str) -> Attribute {
    Attribute::Misc(property.to_string())
}
