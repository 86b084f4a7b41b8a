use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const MUTATION_SPAN: f64 = 0.1;
const GENE_DEFAULT_VALUE: f64 = 0.5;
const SPEED_SIZE_PENALTY: f64 = 0.5;
const OPTIMAL_COLOR: f64 = 0.5;

pub const GENE_SPEED: &str = "speed";
pub const GENE_SIZE: &str = "size";
pub const GENE_COLOR: &str = "color";
pub const KNOWN_GENES: [&str; 3] = [GENE_SPEED, GENE_SIZE, GENE_COLOR];

pub type FishGenome = HashMap<String, f64>;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GenomePair {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fish1: FishGenome,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fish2: FishGenome,
}

/// A `null` genome decodes as one with no genes.
pub fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FishGenome, D::Error> {
    Ok(Option::<FishGenome>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub population_size: i64,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub food_availability: f64,
    pub predator_density: f64,
    pub water_temperature: f64,
}

impl SimulationParameters {
    /// Parameters every handler runs with. Client-supplied values are not
    /// accepted yet.
    pub const DEFAULT: Self = Self {
        population_size: 10,
        mutation_rate: 0.01,
        crossover_rate: 0.7,
        food_availability: 0.5,
        predator_density: 0.2,
        water_temperature: 20.0,
    };
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How `breed` treats genes that only one parent carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingGenePolicy {
    /// Genes absent from the second parent read as 0.0; genes only the second
    /// parent carries are dropped.
    #[default]
    ZeroFill,
    /// Parents must carry identical gene sets.
    StrictKeyMatch,
}

impl MissingGenePolicy {
    pub fn label(self) -> &'static str {
        match self {
            Self::ZeroFill => "zero_fill",
            Self::StrictKeyMatch => "strict",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "zero_fill" | "zero-fill" | "default_fill" => Some(Self::ZeroFill),
            "strict" | "strict_key_match" => Some(Self::StrictKeyMatch),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BreedError {
    #[error("parent gene sets differ (missing from fish2: {missing:?}, only in fish2: {unexpected:?})")]
    MismatchedGenes {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
}

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }
}

pub fn breed<R: RandomSource + ?Sized>(
    parent1: &FishGenome,
    parent2: &FishGenome,
    params: &SimulationParameters,
    policy: MissingGenePolicy,
    rng: &mut R,
) -> Result<FishGenome, BreedError> {
    if policy == MissingGenePolicy::StrictKeyMatch {
        check_matching_genes(parent1, parent2)?;
    }

    let mut offspring = FishGenome::with_capacity(parent1.len());
    for (gene, &value1) in parent1 {
        let value2 = parent2.get(gene).copied().unwrap_or(0.0);
        let mut value = if rng.next_unit() < params.crossover_rate {
            (value1 + value2) / 2.0
        } else if rng.next_unit() < 0.5 {
            value1
        } else {
            value2
        };
        if rng.next_unit() < params.mutation_rate {
            value += (rng.next_unit() - 0.5) * MUTATION_SPAN;
        }
        offspring.insert(gene.clone(), value);
    }
    Ok(offspring)
}

fn check_matching_genes(parent1: &FishGenome, parent2: &FishGenome) -> Result<(), BreedError> {
    let missing: BTreeSet<&String> = parent1
        .keys()
        .filter(|gene| !parent2.contains_key(*gene))
        .collect();
    let unexpected: BTreeSet<&String> = parent2
        .keys()
        .filter(|gene| !parent1.contains_key(*gene))
        .collect();
    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }
    Err(BreedError::MismatchedGenes {
        missing: missing.into_iter().cloned().collect(),
        unexpected: unexpected.into_iter().cloned().collect(),
    })
}

pub fn random_genome<R: RandomSource + ?Sized>(rng: &mut R) -> FishGenome {
    KNOWN_GENES
        .iter()
        .map(|gene| (gene.to_string(), rng.next_unit()))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FitnessReport {
    pub fitness: f64,
    pub genes: BTreeMap<String, f64>,
}

pub fn evaluate_fitness(genome: &FishGenome, params: &SimulationParameters) -> FitnessReport {
    let gene = |name: &str| genome.get(name).copied().unwrap_or(GENE_DEFAULT_VALUE);
    let speed = gene(GENE_SPEED);
    let size = gene(GENE_SIZE);
    let color = gene(GENE_COLOR);

    // Bigger fish pay for speed and need more food.
    let speed_fitness = speed * params.food_availability - size * SPEED_SIZE_PENALTY;
    let size_fitness =
        size * (1.0 - params.predator_density) - size * (1.0 - params.food_availability);
    let color_fitness = (1.0 - (OPTIMAL_COLOR - color).abs()) * (1.0 - params.predator_density);

    let genes = BTreeMap::from([
        (GENE_SPEED.to_string(), speed_fitness),
        (GENE_SIZE.to_string(), size_fitness),
        (GENE_COLOR.to_string(), color_fitness),
    ]);
    FitnessReport {
        fitness: speed_fitness + size_fitness + color_fitness,
        genes,
    }
}
