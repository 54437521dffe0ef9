use anyhow::{bail, Context};
use client_core::{LayerOptions, LayerParams, HOME_LAYER};

#[derive(Debug, Clone, Copy)]
pub enum PresetSource {
    Adopted,
    Path(&'static str),
    Template(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    pub source: PresetSource,
}

impl Preset {
    pub fn options(&self) -> LayerOptions {
        match self.source {
            PresetSource::Adopted => LayerOptions::adopt(self.name),
            PresetSource::Path(path) => LayerOptions::remote(self.name, path),
            PresetSource::Template(template) => LayerOptions::templated(self.name, template),
        }
    }
}

pub const PRESETS: &[Preset] = &[
    Preset {
        name: HOME_LAYER,
        source: PresetSource::Adopted,
    },
    Preset {
        name: "add-sample",
        source: PresetSource::Path("/add_sample"),
    },
    Preset {
        name: "peak-grouping-match-samples",
        source: PresetSource::Path("/peak_grouping_match_samples"),
    },
    Preset {
        name: "tandem-match-samples",
        source: PresetSource::Path("/tandem_match_samples"),
    },
    Preset {
        name: "glycopeptide-search-space",
        source: PresetSource::Path("/glycopeptide_search_space"),
    },
    Preset {
        name: "glycan-search-space",
        source: PresetSource::Path("/glycan_search_space"),
    },
    Preset {
        name: "view-database-search-results",
        source: PresetSource::Template(
            "/view_database_search_results/{hypothesis_sample_match_id}",
        ),
    },
];

pub fn by_name(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|preset| preset.name == name)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub preset: String,
    pub params: Option<LayerParams>,
}

impl OpenRequest {
    pub fn preset(&self) -> anyhow::Result<&'static Preset> {
        by_name(&self.preset).with_context(|| {
            let known: Vec<&str> = PRESETS.iter().map(|preset| preset.name).collect();
            format!("unknown preset '{}' (known: {})", self.preset, known.join(", "))
        })
    }
}

pub fn parse_open(raw: &str) -> anyhow::Result<OpenRequest> {
    let (preset, params) = match raw.split_once(':') {
        Some((preset, params)) => (preset.trim(), Some(params)),
        None => (raw.trim(), None),
    };
    if preset.is_empty() {
        bail!("missing preset name in '{raw}'");
    }

    let params = params
        .map(|params| {
            params
                .split(',')
                .filter(|pair| !pair.trim().is_empty())
                .map(|pair| {
                    let (key, value) = pair
                        .split_once('=')
                        .with_context(|| format!("expected key=value, found '{pair}'"))?;
                    Ok((key.trim().to_string(), value.trim().to_string()))
                })
                .collect::<anyhow::Result<LayerParams>>()
        })
        .transpose()?;

    Ok(OpenRequest {
        preset: preset.to_string(),
        params,
    })
}
