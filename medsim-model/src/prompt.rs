//! Prompt templates for answering, role-play and grading.

use medsim_rag::RetrievalResult;

use crate::persona::Persona;

/// Role instructions for study-mode answers.
pub const SYSTEM_PROMPT: &str = "You are a helpful virtual patient simulator for medical students. \
Use the provided medical case snippets to answer the user's question. \
Cite sources as [PMC_id]. If the answer is uncertain or missing, explicitly say you don't know.";

/// Conduct rules included in every prompt.
pub const ETHICS_POLICY: &str = "Ethics/HIPAA: Use professional, respectful, non-discriminatory language. \
Follow minimum-necessary PHI: avoid requesting or revealing unnecessary identifiers (e.g., SSN, exact address, financial IDs). \
Do not disclose third-party PHI. Ask sensitive topics only when clinically relevant and with consent. \
Avoid leading/coercive questions. If unsure, ask for clarification rather than inventing details.";

/// Opening line the clinician says when a new patient is seated.
pub const OPENING_QUESTION: &str = "What brings you in today?";

/// Retrieval query used to ground a new patient's opening reply.
pub const OPENING_QUERY: &str = "chief complaint presenting symptoms";

/// `[Source: id]` headed snippets separated by blank lines.
pub fn context_block(contexts: &[RetrievalResult]) -> String {
    contexts
        .iter()
        .map(|c| format!("[Source: {}]\n{}", c.source_id, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt for a cited, concise answer to a study question.
pub fn study_prompt(question: &str, contexts: &[RetrievalResult]) -> String {
    format!(
        "System: {SYSTEM_PROMPT}\n\n\
         Policy: {ETHICS_POLICY}\n\n\
         Context:\n{context}\n\n\
         User question: {question}\n\n\
         Answer concisely. Include citations like [PMC_id] where relevant.",
        context = context_block(contexts),
    )
}

/// Prompt for an in-character patient reply to `utterance`.
pub fn patient_prompt(
    utterance: &str,
    contexts: &[RetrievalResult],
    persona: Option<&Persona>,
) -> String {
    let persona = persona.map(ToString::to_string).unwrap_or_default();
    format!(
        "System: You are roleplaying as a cooperative patient. Answer only with subjective information a patient would say.\n\
         If the clinician asks for data you wouldn't know (labs, imaging), respond with uncertainty or what you were told.\n\
         If not sure, say you don't know. Keep responses concise and natural.\n\
         Policy: {ETHICS_POLICY}\n\n\
         Patient persona (optional):\n{persona}\n\n\
         Relevant case snippets for consistency (not shown to user):\n{context}\n\n\
         Clinician says: {utterance}\n\n\
         Patient reply:",
        context = context_block(contexts),
    )
}

/// Prompt asking for a JSON rubric grade of a student's question.
pub fn evaluation_prompt(question: &str, contexts: &[RetrievalResult]) -> String {
    format!(
        r#"System: You are a clinical educator evaluating a medical student's question to a virtual patient.
Use the RAG context (case snippets) and the policy below. Score 0-5 for each criterion.
Explain briefly why. Return ONLY JSON following the schema.

Policy:
{ETHICS_POLICY}

Case context:
{context}

Student question:
{question}

JSON schema (fill all fields with appropriate values):
{{
  "scores": {{
    "relevance": 0,
    "diagnostic_utility": 0,
    "clarity_specificity": 0,
    "empathy_professionalism": 0,
    "hipaa_ethics": 0
  }},
  "reasoning": {{
    "relevance": "",
    "diagnostic_utility": "",
    "clarity_specificity": "",
    "empathy_professionalism": "",
    "hipaa_ethics": ""
  }},
  "phase_guess": "",
  "risk_flags": []
}}
"#,
        context = context_block(contexts),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source: &str, text: &str) -> RetrievalResult {
        RetrievalResult { text: text.into(), source_id: source.into(), chunk_index: 0, score: 0.1 }
    }

    #[test]
    fn context_block_joins_with_blank_lines() {
        let block = context_block(&[hit("PMC1", "fever"), hit("PMC2", "rash")]);
        assert_eq!(block, "[Source: PMC1]\nfever\n\n[Source: PMC2]\nrash");
        assert_eq!(context_block(&[]), "");
    }

    #[test]
    fn patient_prompt_embeds_persona_and_utterance() {
        let persona = Persona { name: "Casey".into(), age: 47, sex: "female".into(), notes: String::new() };
        let prompt = patient_prompt("Any allergies?", &[hit("PMC9", "penicillin")], Some(&persona));
        assert!(prompt.contains("Name: Casey\nAge: 47\nSex: female"));
        assert!(prompt.contains("Clinician says: Any allergies?"));
        assert!(prompt.contains("[Source: PMC9]\npenicillin"));
        assert!(prompt.ends_with("Patient reply:"));
    }

    #[test]
    fn evaluation_prompt_lists_every_criterion() {
        let prompt = evaluation_prompt("How long has the pain lasted?", &[]);
        for key in ["relevance", "diagnostic_utility", "clarity_specificity", "empathy_professionalism", "hipaa_ethics"] {
            assert!(prompt.contains(&format!("\"{key}\": 0")), "{key}");
        }
    }
}
