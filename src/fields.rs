//! Field-def builder (spec.md §4.3): turns `Field <kind> <property>` headers
//! into per-kind, index-aligned `FieldDef` vectors with a decoder and
//! predictor already bound.

use std::collections::BTreeMap;

use crate::decode::{Encoding, Predictor, GPS_LATITUDE_ENCODING};
use crate::error::Result;
use crate::frame::FrameKind;
use crate::header::{HeaderValue, Headers, Scalar};

/// One field's decoding recipe, bound once at build time and immutable
/// afterwards (spec.md §3 `FieldDef`).
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub signed: bool,
    pub encoding_id: u32,
    pub predictor_id: u32,
    pub encoding: Option<Encoding>,
    pub predictor: Option<Predictor>,
    /// Raw `Field <tag> width` value, carried through unbound (spec.md §4.3
    /// lists it as a recognized property but gives it no decode-time
    /// semantics of its own — the encoding id already determines field
    /// width).
    pub width: Option<i64>,
}

impl FieldDef {
    fn new() -> Self {
        FieldDef {
            name: String::new(),
            signed: false,
            encoding_id: 0,
            predictor_id: 0,
            encoding: None,
            predictor: None,
            width: None,
        }
    }
}

/// `FieldDefs[kind]` for every kind whose headers were present in this
/// session (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct FieldDefs(BTreeMap<FrameKind, Vec<FieldDef>>);

impl FieldDefs {
    #[must_use]
    pub fn get(&self, kind: FrameKind) -> Option<&[FieldDef]> {
        self.0.get(&kind).map(Vec::as_slice)
    }

    #[must_use]
    pub fn field_count(&self, kind: FrameKind) -> usize {
        self.0.get(&kind).map_or(0, Vec::len)
    }

    /// Position of the field named `name` within `kind`'s field defs, e.g.
    /// looking up `"time"`/`"loopIteration"` for main-frame validation
    /// (spec.md §4.4).
    #[must_use]
    pub fn field_index(&self, kind: FrameKind, name: &str) -> Option<usize> {
        self.0.get(&kind)?.iter().position(|f| f.name == name)
    }

    /// Assemble the public field-name list (spec.md §6 `SessionView.field_names`):
    /// Intra names, then Slow names not already listed, then Gps names not
    /// already listed and excluding the Gps `time` column.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut seen = std::collections::HashSet::new();

        if let Some(intra) = self.0.get(&FrameKind::Intra) {
            for f in intra {
                if seen.insert(f.name.clone()) {
                    names.push(f.name.clone());
                }
            }
        }
        if let Some(slow) = self.0.get(&FrameKind::Slow) {
            for f in slow {
                if seen.insert(f.name.clone()) {
                    names.push(f.name.clone());
                }
            }
        }
        if let Some(gps) = self.0.get(&FrameKind::Gps) {
            for f in gps.iter().filter(|f| f.name != "time") {
                if seen.insert(f.name.clone()) {
                    names.push(f.name.clone());
                }
            }
        }
        names
    }
}

/// Parse `Field <tag> <property>` headers for every kind into bound
/// `FieldDefs` (spec.md §4.3).
pub fn build_field_defs(headers: &Headers) -> Result<FieldDefs> {
    let mut defs: BTreeMap<FrameKind, Vec<FieldDef>> = BTreeMap::new();
    let data_version = headers.get_scalar("Data version").and_then(Scalar::as_i64);

    for kind in [
        FrameKind::Intra,
        FrameKind::Inter,
        FrameKind::Slow,
        FrameKind::Gps,
        FrameKind::GpsHome,
    ] {
        let Some(tag) = kind.header_tag() else {
            continue;
        };
        let prefix = format!("Field {} ", tag as char);

        // Apply "name" first, regardless of the header map's alphabetical
        // key order: the GPS_coord[1] rewrite in `apply_property` keys off
        // `fdef.name`, so it must already be set before "encoding"/
        // "predictor" (which sort before "name" in the map) are applied.
        for prop in ["name", "signed", "width", "predictor", "encoding"] {
            let key = format!("{prefix}{prop}");
            let Some(value) = headers.get(&key) else {
                continue;
            };
            let values: Vec<Scalar> = match value {
                HeaderValue::List(list) => list.clone(),
                HeaderValue::Scalar(s) => vec![s.clone()],
            };
            let bucket = defs.entry(kind).or_insert_with(|| {
                (0..values.len()).map(|_| FieldDef::new()).collect()
            });
            if bucket.len() < values.len() {
                bucket.resize_with(values.len(), FieldDef::new);
            }

            for (i, raw) in values.iter().enumerate() {
                let Some(fdef) = bucket.get_mut(i) else {
                    continue;
                };
                apply_property(fdef, prop, raw, data_version, i)?;
            }
        }
    }

    for bucket in defs.values_mut() {
        rebind_tag8_8svb_groups(bucket, data_version)?;
    }

    if let Some(inter) = defs.get(&FrameKind::Inter).cloned() {
        if let Some(intra) = defs.get(&FrameKind::Intra) {
            let mut inter = inter;
            for (i, fdef) in inter.iter_mut().enumerate() {
                if let Some(src) = intra.get(i) {
                    fdef.name = src.name.clone();
                }
            }
            defs.insert(FrameKind::Inter, inter);
        }
    }

    Ok(FieldDefs(defs))
}

/// `TAG8_8SVB` (encoding id 6) decodes a whole run of consecutive
/// same-encoding fields from one tag byte; the run length is not itself a
/// header property, so it is inferred here as the count of consecutive
/// fields sharing encoding id 6, capped at 8 (spec.md §4.2 decoder contract:
/// "a fixed-size tuple of integers... decode several fields at once").
const TAG8_8SVB_ENCODING_ID: u32 = 6;

fn rebind_tag8_8svb_groups(bucket: &mut [FieldDef], data_version: Option<i64>) -> Result<()> {
    let mut i = 0;
    while i < bucket.len() {
        if bucket[i].encoding_id != TAG8_8SVB_ENCODING_ID {
            i += 1;
            continue;
        }
        let mut run = 1;
        while i + run < bucket.len()
            && bucket[i + run].encoding_id == TAG8_8SVB_ENCODING_ID
            && run < 8
        {
            run += 1;
        }
        bucket[i].encoding = Some(Encoding::resolve(TAG8_8SVB_ENCODING_ID, data_version, run)?);
        i += run;
    }
    Ok(())
}

fn apply_property(
    fdef: &mut FieldDef,
    prop: &str,
    raw: &Scalar,
    data_version: Option<i64>,
    field_index: usize,
) -> Result<()> {
    match prop {
        "name" => {
            if let Scalar::Str(s) = raw {
                fdef.name = s.clone();
            }
        }
        "signed" => {
            fdef.signed = raw.as_i64().unwrap_or(0) != 0;
        }
        "width" => {
            fdef.width = raw.as_i64();
        }
        "predictor" => {
            let id = raw.as_i64().unwrap_or(0) as u32;
            fdef.predictor_id = id;
            let gps_coord_index = (fdef.name == "GPS_coord[1]").then_some(field_index);
            fdef.predictor = Some(Predictor::resolve(id, field_index, gps_coord_index)?);
        }
        "encoding" => {
            let mut id = raw.as_i64().unwrap_or(0) as u32;
            // GPS_coord[1]/encoding==7 special case (spec.md §4.3).
            if fdef.name == "GPS_coord[1]" && id == 7 {
                id = GPS_LATITUDE_ENCODING;
            }
            fdef.encoding_id = id;
            fdef.encoding = Some(Encoding::resolve(id, data_version, 0)?);
        }
        _ => {}
    }
    Ok(())
}
