//! Synthetic patient personas.

use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

const NAMES: &[&str] = &["Alex", "Jordan", "Taylor", "Casey", "Riley", "Morgan"];
const SEXES: &[&str] = &["male", "female"];
const AGES: &[u32] = &[22, 35, 47, 60, 72];

/// Who the simulated patient is, independent of the case they present with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub age: u32,
    pub sex: String,
    pub notes: String,
}

impl Persona {
    /// Draw a persona at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            name: pick(NAMES, rng).to_string(),
            age: AGES.choose(rng).copied().unwrap_or(35),
            sex: pick(SEXES, rng).to_string(),
            notes: "Cooperative, answers succinctly.".to_string(),
        }
    }
}

fn pick<'a, R: Rng + ?Sized>(options: &[&'a str], rng: &mut R) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

/// One `Key: value` line per non-empty field.
impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::with_capacity(4);
        if !self.name.is_empty() {
            lines.push(format!("Name: {}", self.name));
        }
        if self.age > 0 {
            lines.push(format!("Age: {}", self.age));
        }
        if !self.sex.is_empty() {
            lines.push(format!("Sex: {}", self.sex));
        }
        if !self.notes.is_empty() {
            lines.push(format!("Notes: {}", self.notes));
        }
        f.write_str(&lines.join("\n"))
    }
}
