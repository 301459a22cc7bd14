pub mod analysis; // Screening risk analysis: AI path with rule-based fallback
