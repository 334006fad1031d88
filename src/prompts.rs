//! Prompts sent to the vision model.
//!
//! Both prompts are fixed strings. Callers can replace either through
//! [`crate::config::AnalysisConfig::system_prompt`] and
//! [`crate::config::AnalysisConfig::instructions`]; the constants here are
//! used only when no override is provided.

/// System message establishing the assistant persona.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful medical imaging diagnosis assistant.";

/// Instructions sent with the image in the user turn.
pub const DIAGNOSIS_PROMPT: &str = r#"You are a board-certified radiologist and medical imaging expert.
Analyze the uploaded medical image and provide:

1. **Image Type** — X-ray, MRI, CT, or Ultrasound
2. **Anatomical Region** — what part of the body is visible
3. **Key Findings** — notable features, densities, or abnormalities
4. **Possible Diagnoses** — rank top differential diagnoses with reasoning
5. **Severity Assessment** — mild / moderate / severe
6. **Patient-Friendly Summary** — explain in everyday language

Format the response in **Markdown** for clarity."#;

/// Section headings the diagnosis prompt asks for, in order.
pub const REPORT_SECTIONS: [&str; 6] = [
    "Image Type",
    "Anatomical Region",
    "Key Findings",
    "Possible Diagnoses",
    "Severity Assessment",
    "Patient-Friendly Summary",
];
