//! Filter-graph compilation.
//!
//! Turns planned segments into a structured graph of filter nodes. The graph
//! is plain data: it can be inspected in tests and serialized separately into
//! the transcoder's `-filter_complex` syntax.
//!
//! ```text
//! concat:   [0:v]trim,setpts[v0]  [0:a]atrim,asetpts[a0]  ...
//!           [v0][v1]...concat[outv]   [a0][a1]...concat[outa]
//!
//! overlay:  [1:v]scale[pip]   [0:v][pip]overlay[output]
//! ```

use std::collections::HashSet;
use std::fmt;

use clipforge_common::error::{ClipforgeError, ClipforgeResult};
use serde::Serialize;

use crate::plan::PlannedSegment;

/// Label produced by the scale node in overlay mode.
const PIP_LABEL: &str = "pip";

/// Stream type within an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn specifier(self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
        }
    }
}

/// A stream reference inside the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum StreamLabel {
    /// A stream of a transcoder input, e.g. `[0:v]`.
    Input { index: usize, kind: StreamKind },
    /// A named link between nodes, e.g. `[v0]`.
    Link(String),
}

impl StreamLabel {
    pub fn input(index: usize, kind: StreamKind) -> Self {
        Self::Input { index, kind }
    }

    pub fn link(name: impl Into<String>) -> Self {
        Self::Link(name.into())
    }
}

impl fmt::Display for StreamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamLabel::Input { index, kind } => write!(f, "[{index}:{}]", kind.specifier()),
            StreamLabel::Link(name) => write!(f, "[{name}]"),
        }
    }
}

/// One filter operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FilterOp {
    /// Keep video between `start` and `end` source seconds.
    Trim { start: f64, end: f64 },
    /// Re-zero video timestamps, then shift them to `offset` output seconds.
    SetPts { offset: f64 },
    /// Audio counterpart of [`FilterOp::Trim`].
    ATrim { start: f64, end: f64 },
    /// Audio counterpart of [`FilterOp::SetPts`].
    ASetPts { offset: f64 },
    /// Join `segments` inputs, each carrying `video` video and `audio` audio streams.
    Concat {
        segments: usize,
        video: usize,
        audio: usize,
    },
    /// Resize to a fixed resolution.
    Scale { width: u32, height: u32 },
    /// Place the second input over the first at the given position expressions.
    Overlay { x: String, y: String },
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOp::Trim { start, end } => {
                write!(f, "trim=start={}:end={}", secs(*start), secs(*end))
            }
            FilterOp::SetPts { offset } => write!(f, "setpts=PTS-STARTPTS+{}/TB", secs(*offset)),
            FilterOp::ATrim { start, end } => {
                write!(f, "atrim=start={}:end={}", secs(*start), secs(*end))
            }
            FilterOp::ASetPts { offset } => {
                write!(f, "asetpts=PTS-STARTPTS+{}/TB", secs(*offset))
            }
            FilterOp::Concat {
                segments,
                video,
                audio,
            } => write!(f, "concat=n={segments}:v={video}:a={audio}"),
            FilterOp::Scale { width, height } => write!(f, "scale={width}:{height}"),
            FilterOp::Overlay { x, y } => write!(f, "overlay={x}:{y}"),
        }
    }
}

/// Format seconds without float noise (`2`, `2.5`, `0.033333`).
fn secs(value: f64) -> String {
    let formatted = format!("{value:.6}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A node: input labels, a chain of operations, output labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterNode {
    pub inputs: Vec<StreamLabel>,
    pub ops: Vec<FilterOp>,
    pub outputs: Vec<StreamLabel>,
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "{input}")?;
        }
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{op}")?;
        }
        for output in &self.outputs {
            write!(f, "{output}")?;
        }
        Ok(())
    }
}

/// Streams mapped into the output container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphOutputs {
    pub video: StreamLabel,
    pub audio: Option<StreamLabel>,
}

/// A compiled filter graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterGraph {
    pub nodes: Vec<FilterNode>,
    pub outputs: GraphOutputs,
}

impl FilterGraph {
    /// Serialize into `-filter_complex` syntax.
    pub fn to_filter_complex(&self) -> String {
        self.nodes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// `-map` directives for the graph outputs.
    pub fn map_args(&self) -> Vec<String> {
        let mut args = vec!["-map".to_string(), self.outputs.video.to_string()];
        if let Some(audio) = &self.outputs.audio {
            args.push("-map".to_string());
            args.push(audio.to_string());
        }
        args
    }
}

/// Placement of the secondary stream in overlay mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverlayLayout {
    pub width: u32,
    pub height: u32,
    /// Distance from the bottom-right corner in pixels.
    pub margin: u32,
}

impl Default for OverlayLayout {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            margin: 10,
        }
    }
}

/// Compilation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// Sequential timeline export.
    Concat,
    /// Two-stream picture-in-picture composition.
    Overlay(OverlayLayout),
}

/// Compile segments with the given strategy.
pub fn compile(segments: &[PlannedSegment], mode: CompileMode) -> ClipforgeResult<FilterGraph> {
    let graph = match mode {
        CompileMode::Concat => compile_concat(segments)?,
        CompileMode::Overlay(layout) => compile_overlay(segments, layout)?,
    };
    ensure_unique_outputs(&graph)?;
    tracing::debug!(
        nodes = graph.nodes.len(),
        filter = %graph.to_filter_complex(),
        "Filter graph compiled"
    );
    Ok(graph)
}

/// Per-segment trim/retime nodes joined by concatenation.
pub fn compile_concat(segments: &[PlannedSegment]) -> ClipforgeResult<FilterGraph> {
    if segments.is_empty() {
        return Err(ClipforgeError::NoValidSegments);
    }

    let mut ordered: Vec<&PlannedSegment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.stream_index);

    let mut nodes = Vec::with_capacity(segments.len() * 2 + 2);
    let mut video_labels = Vec::with_capacity(segments.len());
    let mut audio_labels = Vec::with_capacity(segments.len());

    for seg in &ordered {
        let video = StreamLabel::link(seg.labels.video.clone());
        let audio = StreamLabel::link(seg.labels.audio.clone());

        nodes.push(FilterNode {
            inputs: vec![StreamLabel::input(seg.input_index, StreamKind::Video)],
            ops: vec![
                FilterOp::Trim {
                    start: seg.in_sec,
                    end: seg.out_sec,
                },
                FilterOp::SetPts {
                    offset: seg.offset_sec,
                },
            ],
            outputs: vec![video.clone()],
        });
        nodes.push(FilterNode {
            inputs: vec![StreamLabel::input(seg.input_index, StreamKind::Audio)],
            ops: vec![
                FilterOp::ATrim {
                    start: seg.in_sec,
                    end: seg.out_sec,
                },
                FilterOp::ASetPts {
                    offset: seg.offset_sec,
                },
            ],
            outputs: vec![audio.clone()],
        });

        video_labels.push(video);
        audio_labels.push(audio);
    }

    if video_labels.len() != audio_labels.len() {
        return Err(ClipforgeError::graph(format!(
            "video/audio label counts diverge ({} vs {})",
            video_labels.len(),
            audio_labels.len()
        )));
    }

    let outv = StreamLabel::link("outv");
    let outa = StreamLabel::link("outa");
    let count = video_labels.len();

    nodes.push(FilterNode {
        inputs: video_labels,
        ops: vec![FilterOp::Concat {
            segments: count,
            video: 1,
            audio: 0,
        }],
        outputs: vec![outv.clone()],
    });
    nodes.push(FilterNode {
        inputs: audio_labels,
        ops: vec![FilterOp::Concat {
            segments: count,
            video: 0,
            audio: 1,
        }],
        outputs: vec![outa.clone()],
    });

    Ok(FilterGraph {
        nodes,
        outputs: GraphOutputs {
            video: outv,
            audio: Some(outa),
        },
    })
}

/// Scale the secondary stream and overlay it on the primary.
///
/// The first segment in stream order is the primary (screen), the second the
/// secondary (camera). Capture streams carry no audio at this stage.
pub fn compile_overlay(
    segments: &[PlannedSegment],
    layout: OverlayLayout,
) -> ClipforgeResult<FilterGraph> {
    let [primary, secondary] = segments else {
        return Err(ClipforgeError::UnsupportedSegmentCount {
            expected: 2,
            found: segments.len(),
        });
    };
    let (primary, secondary) = if primary.stream_index <= secondary.stream_index {
        (primary, secondary)
    } else {
        (secondary, primary)
    };

    let pip = StreamLabel::link(PIP_LABEL);
    let output = StreamLabel::link("output");

    let nodes = vec![
        FilterNode {
            inputs: vec![StreamLabel::input(secondary.input_index, StreamKind::Video)],
            ops: vec![FilterOp::Scale {
                width: layout.width,
                height: layout.height,
            }],
            outputs: vec![pip.clone()],
        },
        FilterNode {
            inputs: vec![
                StreamLabel::input(primary.input_index, StreamKind::Video),
                pip,
            ],
            ops: vec![FilterOp::Overlay {
                x: format!("main_w-overlay_w-{}", layout.margin),
                y: format!("main_h-overlay_h-{}", layout.margin),
            }],
            outputs: vec![output.clone()],
        },
    ];

    Ok(FilterGraph {
        nodes,
        outputs: GraphOutputs {
            video: output,
            audio: None,
        },
    })
}

fn ensure_unique_outputs(graph: &FilterGraph) -> ClipforgeResult<()> {
    let mut seen = HashSet::new();
    for label in graph.nodes.iter().flat_map(|n| n.outputs.iter()) {
        if !seen.insert(label) {
            return Err(ClipforgeError::graph(format!(
                "label {label} produced more than once"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::SegmentLabels;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn segment(
        stream_index: usize,
        input_index: usize,
        in_sec: f64,
        out_sec: f64,
        offset: f64,
    ) -> PlannedSegment {
        PlannedSegment {
            item_id: format!("i{stream_index}"),
            clip_id: format!("c{input_index}"),
            source: PathBuf::from(format!("/media/c{input_index}.mp4")),
            input_index,
            stream_index,
            in_sec,
            out_sec,
            offset_sec: offset,
            labels: SegmentLabels::for_stream(stream_index),
        }
    }

    #[test]
    fn test_trim_then_shift_to_output_position() {
        let graph = compile(&[segment(0, 0, 2.0, 7.0, 10.0)], CompileMode::Concat).unwrap();
        assert_eq!(
            graph.nodes[0].to_string(),
            "[0:v]trim=start=2:end=7,setpts=PTS-STARTPTS+10/TB[v0]"
        );
        assert_eq!(
            graph.nodes[1].to_string(),
            "[0:a]atrim=start=2:end=7,asetpts=PTS-STARTPTS+10/TB[a0]"
        );
        assert_eq!(
            graph.nodes[0].ops,
            vec![
                FilterOp::Trim {
                    start: 2.0,
                    end: 7.0
                },
                FilterOp::SetPts { offset: 10.0 }
            ]
        );
    }

    #[test]
    fn test_concat_serialization() {
        let segments = vec![segment(0, 0, 0.0, 5.0, 0.0), segment(1, 1, 1.5, 3.25, 5.0)];
        let graph = compile(&segments, CompileMode::Concat).unwrap();
        assert_eq!(
            graph.to_filter_complex(),
            "[0:v]trim=start=0:end=5,setpts=PTS-STARTPTS+0/TB[v0];\
             [0:a]atrim=start=0:end=5,asetpts=PTS-STARTPTS+0/TB[a0];\
             [1:v]trim=start=1.5:end=3.25,setpts=PTS-STARTPTS+5/TB[v1];\
             [1:a]atrim=start=1.5:end=3.25,asetpts=PTS-STARTPTS+5/TB[a1];\
             [v0][v1]concat=n=2:v=1:a=0[outv];\
             [a0][a1]concat=n=2:v=0:a=1[outa]"
        );
        assert_eq!(graph.map_args(), vec!["-map", "[outv]", "-map", "[outa]"]);
    }

    #[test]
    fn test_join_follows_stream_order() {
        let segments = vec![segment(1, 0, 0.0, 1.0, 1.0), segment(0, 0, 0.0, 1.0, 0.0)];
        let graph = compile(&segments, CompileMode::Concat).unwrap();
        let join = &graph.nodes[graph.nodes.len() - 2];
        assert_eq!(
            join.inputs,
            vec![StreamLabel::link("v0"), StreamLabel::link("v1")]
        );
    }

    #[test]
    fn test_concat_rejects_empty_input() {
        assert!(matches!(
            compile(&[], CompileMode::Concat),
            Err(ClipforgeError::NoValidSegments)
        ));
    }

    #[test]
    fn test_colliding_labels_abort_compilation() {
        let mut dup = segment(1, 0, 0.0, 1.0, 1.0);
        dup.labels = SegmentLabels::for_stream(0);
        let segments = vec![segment(0, 0, 0.0, 1.0, 0.0), dup];
        assert!(matches!(
            compile(&segments, CompileMode::Concat),
            Err(ClipforgeError::GraphConstruction { .. })
        ));
    }

    #[test]
    fn test_overlay_two_streams() {
        let segments = vec![segment(0, 0, 0.0, 30.0, 0.0), segment(1, 1, 0.0, 30.0, 0.0)];
        let graph = compile(&segments, CompileMode::Overlay(OverlayLayout::default())).unwrap();
        assert_eq!(
            graph.to_filter_complex(),
            "[1:v]scale=320:240[pip];[0:v][pip]overlay=main_w-overlay_w-10:main_h-overlay_h-10[output]"
        );
        assert_eq!(graph.outputs.audio, None);
        assert_eq!(graph.map_args(), vec!["-map", "[output]"]);
    }

    #[test]
    fn test_overlay_rejects_three_streams() {
        let segments = vec![
            segment(0, 0, 0.0, 1.0, 0.0),
            segment(1, 1, 0.0, 1.0, 0.0),
            segment(2, 2, 0.0, 1.0, 0.0),
        ];
        let err = compile(&segments, CompileMode::Overlay(OverlayLayout::default())).unwrap_err();
        assert!(matches!(
            err,
            ClipforgeError::UnsupportedSegmentCount {
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn test_secs_formatting() {
        assert_eq!(secs(0.0), "0");
        assert_eq!(secs(10.0), "10");
        assert_eq!(secs(0.1 + 0.2), "0.3");
        assert_eq!(secs(1.0 / 30.0), "0.033333");
    }

    proptest! {
        #[test]
        fn prop_one_video_and_audio_node_per_segment(
            spans in prop::collection::vec((0.0f64..50.0, 0.1f64..10.0, 0usize..4), 1..20)
        ) {
            let segments: Vec<PlannedSegment> = spans
                .iter()
                .enumerate()
                .map(|(i, (start, len, input))| segment(i, *input, *start, start + len, i as f64))
                .collect();
            let graph = compile(&segments, CompileMode::Concat).unwrap();

            let n = segments.len();
            prop_assert_eq!(graph.nodes.len(), 2 * n + 2);
            let video_nodes = graph
                .nodes
                .iter()
                .filter(|node| matches!(node.ops[0], FilterOp::Trim { .. }))
                .count();
            let audio_nodes = graph
                .nodes
                .iter()
                .filter(|node| matches!(node.ops[0], FilterOp::ATrim { .. }))
                .count();
            prop_assert_eq!(video_nodes, n);
            prop_assert_eq!(audio_nodes, n);
            prop_assert_eq!(graph.nodes[2 * n].inputs.len(), n);
            prop_assert_eq!(graph.nodes[2 * n + 1].inputs.len(), n);
        }
    }
}
