//! Filter graph assembly.

use std::fmt;

use greensub_common::error::GreensubResult;
use greensub_job_model::{Canvas, GuideToggle, JobSpec, Rgba};

use crate::color::engine_color;
use crate::escape::{filter_option_value, filtergraph_args, utf8_path};
use crate::style::force_style;

/// Label of the graph's final video output.
pub const OUTPUT_LABEL: &str = "vout";

/// Title-safe area as a percentage of the reference rectangle.
pub const TITLE_SAFE_PERCENT: u32 = 80;
/// Action-safe area as a percentage of the reference rectangle.
pub const ACTION_SAFE_PERCENT: u32 = 90;

const TITLE_SAFE_COLOR: Rgba = Rgba::rgba(0xFF, 0xFF, 0x00, 0xCC);
const ACTION_SAFE_COLOR: Rgba = Rgba::rgba(0xFF, 0x00, 0xFF, 0xCC);

/// One filter with its options in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    name: &'static str,
    options: Vec<(Option<&'static str>, String)>,
}

impl Filter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            options: Vec::new(),
        }
    }

    pub fn opt(mut self, key: &'static str, value: impl ToString) -> Self {
        self.options.push((Some(key), value.to_string()));
        self
    }

    pub fn positional(mut self, value: impl ToString) -> Self {
        self.options.push((None, value.to_string()));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Raw value of a named option.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| *k == Some(key))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        if self.options.is_empty() {
            return Ok(());
        }
        let args = self
            .options
            .iter()
            .map(|(key, value)| match key {
                Some(key) => format!("{key}={}", filter_option_value(value)),
                None => filter_option_value(value),
            })
            .collect::<Vec<_>>()
            .join(":");
        write!(f, "={}", filtergraph_args(&args))
    }
}

/// A linear chain of filters between labelled pads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    inputs: Vec<&'static str>,
    filters: Vec<Filter>,
    output: &'static str,
}

impl FilterChain {
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn output(&self) -> &'static str {
        self.output
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{input}]")?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{filter}")?;
        }
        write!(f, "[{}]", self.output)
    }
}

/// The complete graph, rendered with `;` between chains.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
}

impl FilterGraph {
    fn push(&mut self, inputs: &[&'static str], filters: Vec<Filter>, output: &'static str) {
        self.chains.push(FilterChain {
            inputs: inputs.to_vec(),
            filters,
            output,
        });
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    /// Filter names in emission order.
    pub fn node_names(&self) -> Vec<&'static str> {
        self.chains
            .iter()
            .flat_map(|chain| chain.filters.iter().map(Filter::name))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_names().contains(&name)
    }

    /// First filter with the given name.
    pub fn find(&self, name: &str) -> Option<&Filter> {
        self.chains
            .iter()
            .flat_map(|chain| chain.filters.iter())
            .find(|filter| filter.name == name)
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{chain}")?;
        }
        Ok(())
    }
}

/// Build the graph for a job. Input 0 must be the source media.
pub fn build_graph(spec: &JobSpec) -> GreensubResult<FilterGraph> {
    let canvas = spec.canvas.even();
    let mut graph = FilterGraph::default();

    graph.push(
        &[],
        vec![Filter::new("color")
            .opt("c", engine_color(spec.background.color()))
            .opt("s", format!("{}x{}", canvas.width, canvas.height))
            .opt("r", spec.frame_rate)],
        "bg",
    );
    graph.push(
        &["0:v"],
        vec![
            Filter::new("scale")
                .opt("w", canvas.width)
                .opt("h", canvas.height)
                .opt("force_original_aspect_ratio", "decrease"),
            Filter::new("setsar").positional(1),
        ],
        "src",
    );
    graph.push(
        &["bg", "src"],
        vec![Filter::new("overlay")
            .opt("x", "(W-w)/2")
            .opt("y", "(H-h)/2")
            .opt("shortest", 1)],
        "base",
    );
    let mut last = "base";

    let guides = guide_filters(spec, canvas);
    if !guides.is_empty() {
        graph.push(&[last], guides, "guides");
        last = "guides";
    }

    if let Some(track) = &spec.subtitle {
        let filename = utf8_path(&track.path, "subtitle.path")?;
        let mut subtitles = Filter::new("subtitles")
            .opt("filename", filename)
            .opt("force_style", force_style(&spec.style, canvas, track.format));
        if !track.format.is_styled() {
            subtitles = subtitles.opt("charenc", "UTF-8");
        }
        graph.push(&[last], vec![subtitles], "subs");
        last = "subs";
    }

    graph.push(
        &[last],
        vec![Filter::new("format").opt("pix_fmts", "yuv420p")],
        OUTPUT_LABEL,
    );
    Ok(graph)
}

fn guide_filters(spec: &JobSpec, canvas: Canvas) -> Vec<Filter> {
    let thickness = (canvas.width.min(canvas.height) / 360).max(2);
    [
        (spec.guides.action_safe, ACTION_SAFE_PERCENT, ACTION_SAFE_COLOR),
        (spec.guides.title_safe, TITLE_SAFE_PERCENT, TITLE_SAFE_COLOR),
    ]
    .into_iter()
    .filter(|(toggle, _, _)| toggle.enabled)
    .map(|(toggle, percent, color)| {
        let (x, y, w, h) = safe_area(canvas, toggle, percent);
        Filter::new("drawbox")
            .opt("x", x)
            .opt("y", y)
            .opt("w", w)
            .opt("h", h)
            .opt("color", engine_color(color))
            .opt("t", thickness)
    })
    .collect()
}

/// Centred safe-area rectangle `(x, y, w, h)` in canvas pixels.
///
/// The reference rectangle is the largest one with the toggle's aspect ratio
/// that fits the canvas; the guide is `percent` of it on each axis.
pub fn safe_area(canvas: Canvas, toggle: GuideToggle, percent: u32) -> (u32, u32, u32, u32) {
    let (aw, ah) = toggle.orientation.aspect();
    let (cw, ch) = (u64::from(canvas.width), u64::from(canvas.height));
    let (aw, ah) = (u64::from(aw), u64::from(ah));

    let (ref_w, ref_h) = if cw * ah <= ch * aw {
        (cw, cw * ah / aw)
    } else {
        (ch * aw / ah, ch)
    };

    let pct = u64::from(percent.min(100));
    let w = ref_w * pct / 100;
    let h = ref_h * pct / 100;
    let x = (cw - w) / 2;
    let y = (ch - h) / 2;
    (x as u32, y as u32, w as u32, h as u32)
}
