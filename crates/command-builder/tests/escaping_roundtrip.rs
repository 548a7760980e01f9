//! Re-parses emitted filter graphs with the engine's tokenizer rules and
//! checks that every user-supplied value comes back unchanged.

use std::path::Path;

use greensub_command_builder::escape::{filter_option_value, filtergraph_args};
use greensub_command_builder::{build_plan, decode_ass_color, engine_color};
use greensub_job_model::{
    Background, JobSpec, Rgba, SubtitleFormat, SubtitleStyle, SubtitleTrack,
};
use proptest::prelude::*;

const WHITESPACE: &[char] = &[' ', '\n', '\t', '\r'];
const GRAPH_TERMS: &[char] = &['[', ']', ',', ';'];
const NAME_TERMS: &[char] = &['=', ',', ';', '['];

/// One token: leading whitespace skipped, `\` escapes the next character,
/// `'...'` quotes, unescaped trailing whitespace trimmed. Stops before any
/// character in `terms`.
fn get_token<'a>(input: &'a str, terms: &[char]) -> (String, &'a str) {
    let mut iter = input.trim_start_matches(WHITESPACE).chars();
    let mut out = String::new();
    let mut keep = 0;
    let rest = loop {
        let before = iter.as_str();
        let Some(c) = iter.next() else {
            break "";
        };
        if terms.contains(&c) {
            break before;
        }
        match c {
            '\\' => match iter.next() {
                Some(next) => {
                    out.push(next);
                    keep = out.len();
                }
                None => out.push('\\'),
            },
            '\'' => loop {
                match iter.next() {
                    Some('\'') => {
                        keep = out.len();
                        break;
                    }
                    Some(q) => out.push(q),
                    None => break,
                }
            },
            _ => out.push(c),
        }
    };
    while out.len() > keep && out.ends_with(WHITESPACE) {
        out.pop();
    }
    (out, rest)
}

#[derive(Debug)]
struct ParsedFilter {
    name: String,
    options: Vec<(Option<String>, String)>,
}

impl ParsedFilter {
    fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k.as_deref() == Some(key))
            .map(|(_, v)| v.as_str())
    }
}

fn skip_labels(mut rest: &str) -> &str {
    while let Some(inner) = rest.strip_prefix('[') {
        let end = inner.find(']').expect("unterminated label");
        rest = &inner[end + 1..];
    }
    rest
}

fn parse_options(args: &str) -> Vec<(Option<String>, String)> {
    let mut options = Vec::new();
    let mut rest = args;
    while !rest.is_empty() {
        let key_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || "-_/.".contains(c)))
            .unwrap_or(rest.len());
        let key = if rest[key_len..].starts_with('=') && key_len > 0 {
            let key = rest[..key_len].to_string();
            rest = &rest[key_len + 1..];
            Some(key)
        } else {
            None
        };
        let (value, after) = get_token(rest, &[':']);
        options.push((key, value));
        rest = after.strip_prefix(':').unwrap_or(after);
    }
    options
}

fn parse_graph(graph: &str) -> Vec<ParsedFilter> {
    let mut filters = Vec::new();
    let mut rest = graph;
    loop {
        rest = skip_labels(rest);
        if rest.is_empty() {
            break;
        }
        let (name, after) = get_token(rest, NAME_TERMS);
        rest = after;
        let mut options = Vec::new();
        if let Some(args) = rest.strip_prefix('=') {
            let (args, after) = get_token(args, GRAPH_TERMS);
            options = parse_options(&args);
            rest = after;
        }
        rest = skip_labels(rest);
        rest = rest
            .strip_prefix(',')
            .or_else(|| rest.strip_prefix(';'))
            .unwrap_or(rest);
        filters.push(ParsedFilter { name, options });
    }
    filters
}

fn force_style_fields(text: &str) -> Vec<(String, String)> {
    text.split(',')
        .map(|pair| {
            let (k, v) = pair.split_once('=').expect("override without '='");
            (k.to_string(), v.to_string())
        })
        .collect()
}

fn field<'a>(fields: &'a [(String, String)], key: &str) -> &'a str {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or_else(|| panic!("{key} missing"))
}

fn rgba() -> impl Strategy<Value = Rgba> {
    (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b, a)| Rgba::rgba(r, g, b, a))
}

#[test]
fn test_handpicked_hostile_values_survive() {
    for value in [
        "C:\\Users\\me\\My Subs\\a.srt",
        "it's [done]; ok, fine",
        " leading and trailing ",
        "'quoted'",
        "back\\slash\\",
        "",
    ] {
        let args = format!("k={}", filter_option_value(value));
        let graph = format!("[in]f={}[out]", filtergraph_args(&args));
        let parsed = parse_graph(&graph);
        assert_eq!(parsed.len(), 1, "{graph}");
        assert_eq!(parsed[0].option("k"), Some(value), "{graph}");
    }
}

proptest! {
    #[test]
    fn prop_option_value_survives_both_levels(value in "\\PC{0,40}") {
        let args = format!("k={}:n=1", filter_option_value(&value));
        let graph = format!("[a]f={}[b]", filtergraph_args(&args));
        let parsed = parse_graph(&graph);
        prop_assert_eq!(parsed.len(), 1);
        prop_assert_eq!(parsed[0].option("k"), Some(value.as_str()));
        prop_assert_eq!(parsed[0].option("n"), Some("1"));
    }

    #[test]
    fn prop_plan_values_roundtrip(
        name in "[a-zA-Z0-9 _.:'\\\\\\[\\],;=@%é日-]{1,24}",
        font in "[A-Za-z][A-Za-z0-9 _.:'\\\\\\[\\];@-]{0,20}",
        text_color in rgba(),
        outline_color in rgba(),
        outline_opacity in 0u8..=100,
        background in rgba(),
    ) {
        let source = format!("/media/{name}.mp4");
        let subtitle = format!("/media/{name}.srt");
        let spec = JobSpec {
            subtitle: Some(SubtitleTrack::new(&subtitle, SubtitleFormat::Srt)),
            style: SubtitleStyle {
                font_family: font.clone(),
                text_color,
                outline_color,
                outline_opacity,
                ..Default::default()
            },
            background: Background::Custom(background),
            ..JobSpec::render(&source, "/out/render.mp4")
        };
        let plan = build_plan(&spec, Path::new("/out/render.mp4")).unwrap();

        let input = plan.args().iter().position(|a| a == "-i").unwrap();
        prop_assert_eq!(&plan.args()[input + 1], &format!("file:{source}"));

        let filters = parse_graph(plan.filter_graph());
        let names: Vec<&str> = filters.iter().map(|f| f.name.as_str()).collect();
        prop_assert_eq!(names, vec!["color", "scale", "setsar", "overlay", "subtitles", "format"]);

        let color = &filters[0];
        let expected_bg = engine_color(background.with_alpha(0xFF));
        prop_assert_eq!(color.option("c"), Some(expected_bg.as_str()));

        let subs = filters.iter().find(|f| f.name == "subtitles").unwrap();
        prop_assert_eq!(subs.option("filename"), Some(subtitle.as_str()));

        let fields = force_style_fields(subs.option("force_style").unwrap());
        prop_assert_eq!(field(&fields, "FontName"), font.trim());
        prop_assert_eq!(decode_ass_color(field(&fields, "PrimaryColour")), Some(text_color));
        prop_assert_eq!(
            decode_ass_color(field(&fields, "OutlineColour")),
            Some(outline_color.with_opacity_percent(outline_opacity))
        );
    }
}
