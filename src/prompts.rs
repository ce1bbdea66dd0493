//! The fixed analysis prompt.
//!
//! The prompt asks for seven numbered, upper-case headings
//! (`1. BACKGROUND` … `7. ACHIEVEMENTS`). Those heading tokens come from
//! [`Section::heading_token`], the same function the section parser in
//! [`crate::pipeline::sections`] matches against, so the request format and
//! the parser cannot drift apart.

use crate::output::Section;

/// Role and framing that precede the paper text.
const PREAMBLE: &str = "You are an expert academic research analyst. \
Analyze the following research paper and extract key information in a structured format.";

/// What each section should contain.
fn section_instruction(section: Section) -> &'static str {
    match section {
        Section::Background => {
            "Summarize the motivation behind the research, its relevance, and the problem it aims to address."
        }
        Section::Objectives => {
            "Clearly outline the main goal of the study and the hypothesis the authors are testing."
        }
        Section::Methodology => {
            "Describe how the authors conducted their research, including experimental design, datasets, and evaluation methods."
        }
        Section::Results => {
            "Summarize the key outcomes of the study, highlighting improvements or novel discoveries."
        }
        Section::Discussion => {
            "Explain the broader implications of the findings and how they compare to existing approaches."
        }
        Section::Contributions => {
            "Highlight the unique contributions of the study and its significance."
        }
        Section::Achievements => {
            "Conclude with the practical impact and potential real-world applications of the research."
        }
    }
}

/// The heading line the model must emit for `section`, e.g. `## 3. METHODOLOGY`.
pub fn heading_line(section: Section) -> String {
    format!("## {}. {}", section.number(), section.heading_token())
}

/// Build the full user message for an (already truncated) paper text.
pub fn analysis_prompt(paper_text: &str) -> String {
    let mut prompt = String::with_capacity(paper_text.len() + 2048);
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\nResearch Paper Text:\n<paper>\n");
    prompt.push_str(paper_text);
    prompt.push_str("\n</paper>\n\nPlease provide a comprehensive analysis with the following sections:\n\n");

    for section in Section::ALL {
        prompt.push_str(&format!(
            "{}. {} ({}): {}\n",
            section.number(),
            section.heading_token(),
            section.title(),
            section_instruction(section)
        ));
    }

    prompt.push_str(
        "\nFormat your response as plain Markdown. Start each section with its heading \
on a line of its own, exactly as shown below, in this order, and do not add any other \
numbered headings:\n\n",
    );
    for section in Section::ALL {
        prompt.push_str(&heading_line(section));
        prompt.push('\n');
    }
    prompt.push_str(
        "\nWrite the section content below each heading. Do not wrap the answer in code fences. \
Ensure the output is concise, well-structured, and preserves core technical details.",
    );

    prompt
}
