//! Fixed prompt templates with `{{name}}` placeholders.

pub const SYSTEM_ANALYST: &str = include_str!("../../data/prompts/system_analyst.txt");
pub const COMPANY_ANALYSIS: &str = include_str!("../../data/prompts/company_analysis.txt");
pub const CONTRACT_RESEARCH: &str = include_str!("../../data/prompts/contract_research.txt");
pub const TOOLS_RESEARCH: &str = include_str!("../../data/prompts/tools_research.txt");
pub const GAO_RESEARCH: &str = include_str!("../../data/prompts/gao_research.txt");
pub const SUMMARY: &str = include_str!("../../data/prompts/summary.txt");

/// Replaces every `{{key}}` with its value. Unknown placeholders stay as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match vars.iter().find(|(k, _)| *k == key) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_all_occurrences() {
        let out = render("{{a}} and {{ a }} then {{b}}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and x then y");
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        assert_eq!(render("hi {{who}}", &[]), "hi {{who}}");
    }

    #[test]
    fn test_render_unterminated_placeholder() {
        assert_eq!(render("open {{brace", &[("brace", "x")]), "open {{brace");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        assert_eq!(render("{{a}}", &[("a", "{{b}}"), ("b", "no")]), "{{b}}");
    }

    #[test]
    fn test_templates_reference_their_variables() {
        assert!(COMPANY_ANALYSIS.contains("{{company_name}}"));
        for key in ["{{award_id}}", "{{recipient_name}}", "{{description}}"] {
            assert!(CONTRACT_RESEARCH.contains(key), "{key}");
        }
        for template in [TOOLS_RESEARCH, GAO_RESEARCH] {
            for key in ["{{award_id}}", "{{recipient_name}}", "{{contract_info}}"] {
                assert!(template.contains(key), "{key}");
            }
        }
        assert!(SUMMARY.contains("{{detailed_analysis}}"));
    }
}
