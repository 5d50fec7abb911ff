//! Entity resolution: match a newly-extracted mention against existing
//! entities using a three-tier cascade.
//!
//! Tiers short-circuit on first hit:
//! 1. exact - case-insensitive name/alias equality, same type;
//! 2. partial - normalized containment with a length-ratio guard;
//! 3. fuzzy - normalized Levenshtein similarity above a threshold.
//!
//! Resolution is a pure lookup; callers perform the create/update.

use crate::config::ResolverConfig;
use crate::types::{Entity, EntityStatus, EntityType};

/// Matches extracted entity mentions against the existing graph.
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Find the existing entity a candidate mention refers to, if any.
    ///
    /// Only ACTIVE entities of the same type are considered. Fuzzy-tier ties
    /// break by highest similarity, then by most recently updated entity.
    pub fn resolve<'a>(
        &self,
        name: &str,
        entity_type: EntityType,
        existing: &'a [Entity],
    ) -> Option<&'a Entity> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let pool: Vec<&Entity> = existing
            .iter()
            .filter(|e| e.status == EntityStatus::Active && e.entity_type == entity_type)
            .collect();

        if let Some(hit) = self.exact_tier(name, &pool) {
            tracing::debug!(name, tier = "exact", matched = %hit.name, "entity resolved");
            return Some(hit);
        }
        if let Some(hit) = self.partial_tier(name, &pool) {
            tracing::debug!(name, tier = "partial", matched = %hit.name, "entity resolved");
            return Some(hit);
        }
        if let Some(hit) = self.fuzzy_tier(name, &pool) {
            tracing::debug!(name, tier = "fuzzy", matched = %hit.name, "entity resolved");
            return Some(hit);
        }
        None
    }

    fn exact_tier<'a>(&self, name: &str, pool: &[&'a Entity]) -> Option<&'a Entity> {
        pool.iter().find(|e| e.answers_to(name)).copied()
    }

    fn partial_tier<'a>(&self, name: &str, pool: &[&'a Entity]) -> Option<&'a Entity> {
        let candidate = normalize(name);
        if candidate.is_empty() {
            return None;
        }

        pool.iter()
            .find(|e| {
                let existing = normalize(&e.name);
                if existing.is_empty() {
                    return false;
                }
                let candidate_chars = candidate.chars().count();
                let existing_chars = existing.chars().count();
                let (shorter, longer, ratio) = if candidate_chars <= existing_chars {
                    (&candidate, &existing, candidate_chars as f64 / existing_chars as f64)
                } else {
                    (&existing, &candidate, existing_chars as f64 / candidate_chars as f64)
                };
                longer.contains(shorter.as_str()) && ratio > self.config.partial_match_min_ratio
            })
            .copied()
    }

    fn fuzzy_tier<'a>(&self, name: &str, pool: &[&'a Entity]) -> Option<&'a Entity> {
        let candidate = normalize(name);

        let mut best: Option<(&Entity, f64)> = None;
        for entity in pool {
            let similarity = normalized_similarity(&candidate, &normalize(&entity.name));
            if similarity < self.config.fuzzy_match_threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((current, current_sim)) => {
                    similarity > current_sim
                        || (similarity == current_sim && entity.updated_at > current.updated_at)
                }
            };
            if better {
                best = Some((entity, similarity));
            }
        }
        best.map(|(entity, _)| entity)
    }
}

/// Normalized Levenshtein similarity: `1 - distance / max(len)`.
/// Empty-vs-empty counts as identical.
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(a, b) as f64 / max_len as f64
}

/// Lowercase, fold diacritics, collapse punctuation and whitespace runs to
/// single spaces.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = true;
    for c in s.chars() {
        let c = fold_diacritic(c);
        let lower = c.to_lowercase().next().unwrap_or(c);
        if lower.is_alphanumeric() {
            out.push(lower);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Map common Latin diacritics to their base letters.
fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        _ => c,
    }
}
