/// Cheap morphological guesses for a query term.
///
/// Italian/French plural endings plus an English plural `s`. Each rule is
/// applied independently to the lowercased term; duplicates and the term
/// itself are dropped. This widens recall and makes no claim of being
/// linguistically correct.
pub fn generate_variants(term: &str) -> Vec<String> {
    let lower = term.trim().to_lowercase();
    if lower.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::with_capacity(4);

    // mandritto -> mandritti
    if let Some(stem) = lower.strip_suffix('o') {
        candidates.push(format!("{stem}i"));
    }
    // spada -> spade
    if let Some(stem) = lower.strip_suffix('a') {
        candidates.push(format!("{stem}e"));
    }
    // fendente -> fendenti
    if let Some(stem) = lower.strip_suffix('e') {
        candidates.push(format!("{stem}i"));
    }
    if !lower.ends_with('s') {
        candidates.push(format!("{lower}s"));
    }

    let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate != lower && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}
