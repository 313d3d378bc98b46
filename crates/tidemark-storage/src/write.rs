//! The stream write pipeline.
//!
//! [`WriteCallback::rev`] consumes one routed batch: every event is folded
//! into a per-group accumulator (`handle`), then each group is flushed once.
//! The pipeline holds no state across calls — parallelism between batches is
//! the transport's concern.
//!
//! ## Accumulator shape
//!
//! ```text
//! group name ─▶ ElementsInGroup
//!                ├─ tsdb                      (group's engine handle)
//!                ├─ segments[]                (acquired refs, one per range)
//!                ├─ tables[] ─▶ ElementsInTable
//!                │               ├─ shard + time_range
//!                │               ├─ elements  (pooled column batch)
//!                │               └─ docs      (element index documents)
//!                ├─ docs[]                    (series documents, deduplicated)
//!                └─ latest_ts
//! ```
//!
//! ## Flush order, per group
//!
//! 1. rows (`add_elements`, infallible) and batch release, per table
//! 2. element index documents, per table — failures are logged, rows stay
//! 3. series documents into every held segment's series index — logged too
//! 4. exactly one `dec_ref` per held segment
//! 5. `tick(latest_ts)`
//!
//! ## Error policy
//!
//! A batching error drops the whole in-progress accumulator (segment refs
//! released, pooled batches returned) and processing continues with the next
//! event: one bad event must never poison the batch, and a half-built group
//! must never flush. Encoded payloads that fail to decode are logged and
//! skipped.

use bytes::Bytes;
use prost::Message;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, warn};

use tidemark_core::{
    hash_str, Document, ElementBatch, Field, FieldKey, IndexRuleType, Series, TagFamily,
    TagType, TagValue, ValueType,
};
use tidemark_proto::model::TagValue as WireTagValue;
use tidemark_proto::stream::{ElementValue, InternalWriteRequest, Metadata};
use tidemark_time::Time;

use crate::admission::{AdmissionController, DiskUsage, SystemDiskUsage};
use crate::error::{Error, Result};
use crate::schema_repo::SchemaRepo;
use crate::{Segment, ShardId, TimeRange, Tsdb, TsTable};

/// One entry of a routed write batch.
pub enum WriteEvent {
    /// An already-decoded request, handed over in process.
    Request(Box<InternalWriteRequest>),
    /// A serialized request as it came off the wire.
    Encoded(Bytes),
}

struct ElementsInTable {
    shard: ShardId,
    time_range: TimeRange,
    table: Arc<dyn TsTable>,
    elements: ElementBatch,
    docs: Vec<Document>,
}

struct ElementsInGroup {
    tsdb: Arc<dyn Tsdb>,
    tables: Vec<ElementsInTable>,
    segments: Vec<Arc<dyn Segment>>,
    latest_ts: i64,
    docs: Vec<Document>,
    doc_ids_added: HashSet<u64>,
}

type Groups = HashMap<String, ElementsInGroup>;

/// The write pipeline: admission gate, per-event batcher, per-group flusher.
pub struct WriteCallback {
    schema_repo: Arc<dyn SchemaRepo>,
    admission: AdmissionController,
}

impl WriteCallback {
    /// Builds a pipeline probing the real filesystem under the repo's path.
    pub fn new(schema_repo: Arc<dyn SchemaRepo>, max_disk_usage_percent: u32) -> Self {
        Self::with_disk_usage(schema_repo, max_disk_usage_percent, Arc::new(SystemDiskUsage))
    }

    pub fn with_disk_usage(
        schema_repo: Arc<dyn SchemaRepo>,
        max_disk_usage_percent: u32,
        disk: Arc<dyn DiskUsage>,
    ) -> Self {
        let admission = AdmissionController::new(
            schema_repo.path().to_path_buf(),
            max_disk_usage_percent,
            disk,
        );
        Self {
            schema_repo,
            admission,
        }
    }

    /// Admission gate; callers reject the batch up front on `DiskFull`.
    pub fn check_health(&self) -> Result<()> {
        self.admission.check_health()
    }

    /// Consumes one batch: accumulate every event, then flush each group.
    pub async fn rev(&self, events: Vec<WriteEvent>) {
        if events.is_empty() {
            warn!("empty write batch");
            return;
        }
        let mut groups = Groups::new();
        let mut doc_id_buf = String::new();
        for event in &events {
            let decoded;
            let request = match event {
                WriteEvent::Request(request) => request.as_ref(),
                WriteEvent::Encoded(buf) => match InternalWriteRequest::decode(buf.as_ref()) {
                    Ok(request) => {
                        decoded = request;
                        &decoded
                    }
                    Err(err) => {
                        error!(error = %err, len = buf.len(), "cannot decode write event");
                        continue;
                    }
                },
            };
            if let Err(err) = self.handle(&mut groups, request, &mut doc_id_buf).await {
                error!(error = %err, "cannot handle write event");
                discard(&mut groups);
            }
        }
        for (_, group) in groups.drain() {
            flush_group(group).await;
        }
    }

    /// Folds one event into the accumulator.
    async fn handle(
        &self,
        groups: &mut Groups,
        event: &InternalWriteRequest,
        doc_id_buf: &mut String,
    ) -> Result<()> {
        let request = event
            .request
            .as_ref()
            .ok_or(Error::MalformedEvent("missing write request"))?;
        let metadata = request
            .metadata
            .as_ref()
            .ok_or(Error::MalformedEvent("missing metadata"))?;
        let element = request
            .element
            .as_ref()
            .ok_or(Error::MalformedEvent("missing element"))?;
        let wire_ts = element
            .timestamp
            .as_ref()
            .ok_or(Error::MalformedEvent("missing timestamp"))?;
        let time = Time::from_timestamp_checked(wire_ts.seconds, wire_ts.nanos)?;
        let ts = time.timestamp_nanos();

        let group_name = metadata.group.as_str();
        if !groups.contains_key(group_name) {
            let tsdb = self.schema_repo.load_tsdb(group_name).await?;
            groups.insert(
                group_name.to_string(),
                ElementsInGroup {
                    tsdb,
                    tables: Vec::new(),
                    segments: Vec::new(),
                    latest_ts: 0,
                    docs: Vec::new(),
                    doc_ids_added: HashSet::new(),
                },
            );
        }
        let eg = groups.get_mut(group_name).expect("group just ensured");
        if eg.latest_ts < ts {
            eg.latest_ts = ts;
        }

        let table_idx = prepare_table(eg, ShardId(event.shard_id), ts).await?;
        self.process_element(eg, table_idx, event, metadata, element, doc_id_buf, ts)
    }

    /// Materialises one element into its table's staging batch and index
    /// documents.
    #[allow(clippy::too_many_arguments)]
    fn process_element(
        &self,
        eg: &mut ElementsInGroup,
        table_idx: usize,
        event: &InternalWriteRequest,
        metadata: &Metadata,
        element: &ElementValue,
        doc_id_buf: &mut String,
        ts: i64,
    ) -> Result<()> {
        let stream = self
            .schema_repo
            .load_stream(&metadata.group, &metadata.name)
            .ok_or_else(|| Error::UnknownStream {
                group: metadata.group.clone(),
                name: metadata.name.clone(),
            })?;
        let schema = stream.schema();

        let family_count = element.tag_families.len();
        if family_count < 1 {
            return Err(Error::NoTagFamilies {
                stream: metadata.name.clone(),
            });
        }
        if family_count > schema.tag_families.len() {
            return Err(Error::TooManyTagFamilies {
                stream: metadata.name.clone(),
                provided: family_count,
                declared: schema.tag_families.len(),
            });
        }

        let series = Series::new(metadata.name.clone(), event.entity_values.clone());
        let encoded_series = series.marshal()?;

        let index_schema = stream.index_schema();
        let locators = &index_schema.locators;
        if locators.tag_family_rules.len() != schema.tag_families.len() {
            return Err(Error::MetadataCorrupted {
                rules: locators.tag_family_rules.len(),
                families: schema.tag_families.len(),
            });
        }

        let ElementsInGroup {
            tables,
            docs: group_docs,
            doc_ids_added,
            ..
        } = eg;
        let et = &mut tables[table_idx];

        et.elements.timestamps.push(ts);

        doc_id_buf.clear();
        doc_id_buf.push_str(&metadata.name);
        doc_id_buf.push('|');
        doc_id_buf.push_str(&element.element_id);
        let element_id = hash_str(doc_id_buf);
        et.elements.element_ids.push(element_id);
        et.elements.series_ids.push(encoded_series.id);

        let mut fields: Vec<Field> = Vec::new();
        let mut families: Vec<TagFamily> = Vec::with_capacity(schema.tag_families.len());
        for (i, family_spec) in schema.tag_families.iter().enumerate() {
            // Trailing families the client omitted read as all-null.
            let provided = element.tag_families.get(i);
            let rules = &locators.tag_family_rules[i];
            let mut family = TagFamily::new(family_spec.name.clone());
            for (j, spec) in family_spec.tags.iter().enumerate() {
                let value = provided.and_then(|f| f.tags.get(j));
                let is_null = value.map_or(true, WireTagValue::is_null);
                let mut indexed = false;
                if let (Some(rule), false) = (rules.get(&spec.name), is_null) {
                    match rule.rule_type {
                        IndexRuleType::Inverted => {
                            append_fields(
                                &mut fields,
                                FieldKey {
                                    index_rule_id: rule.rule_id,
                                    analyzer: rule.analyzer.clone(),
                                    series_id: encoded_series.id,
                                },
                                spec.tag_type,
                                value.expect("non-null value"),
                                rule.no_sort,
                            );
                        }
                        IndexRuleType::Skipping => indexed = true,
                    }
                }
                // Entity tags live in the series key, indexed-only tags in
                // the index; neither reaches column storage.
                if spec.indexed_only || locators.entity_set.contains(&spec.name) {
                    continue;
                }
                let mut tag_value = encode_tag_value(&spec.name, spec.tag_type, value);
                tag_value.indexed = indexed;
                family.values.push(tag_value);
            }
            if !family.values.is_empty() {
                families.push(family);
            }
        }
        et.elements.tag_families.push(families);

        et.docs.push(Document {
            doc_id: element_id,
            fields,
            timestamp: ts,
            entity_values: None,
        });

        if doc_ids_added.insert(encoded_series.id) {
            group_docs.push(Document {
                doc_id: encoded_series.id,
                fields: Vec::new(),
                timestamp: 0,
                entity_values: Some(encoded_series.buffer.clone()),
            });
        }
        Ok(())
    }
}

/// Finds or opens the table covering `ts`, acquiring the segment on the way.
async fn prepare_table(eg: &mut ElementsInGroup, shard: ShardId, ts: i64) -> Result<usize> {
    if let Some(idx) = eg
        .tables
        .iter()
        .position(|t| t.shard == shard && t.time_range.contains(ts))
    {
        return Ok(idx);
    }
    let segment = match eg.segments.iter().find(|s| s.time_range().contains(ts)) {
        Some(segment) => Arc::clone(segment),
        None => {
            let segment = eg.tsdb.create_segment_if_not_exist(ts).await?;
            eg.segments.push(Arc::clone(&segment));
            segment
        }
    };
    let table = segment.create_ts_table_if_not_exist(shard).await?;
    let mut elements = ElementBatch::acquire();
    elements.reset();
    eg.tables.push(ElementsInTable {
        shard,
        time_range: segment.time_range(),
        table,
        elements,
        docs: Vec::new(),
    });
    Ok(eg.tables.len() - 1)
}

/// Commits one group's accumulated state.
async fn flush_group(group: ElementsInGroup) {
    let ElementsInGroup {
        tsdb,
        tables,
        segments,
        latest_ts,
        docs,
        ..
    } = group;
    for et in tables {
        debug_assert!(et.elements.is_aligned());
        et.table.add_elements(&et.elements);
        ElementBatch::release(et.elements);
        if !et.docs.is_empty() {
            if let Err(err) = et.table.index().write(&et.docs).await {
                error!(error = %err, "cannot write element index");
            }
        }
    }
    if !docs.is_empty() {
        for segment in &segments {
            if let Err(err) = segment.index_db().write(&docs).await {
                error!(error = %err, "cannot write series index");
            }
        }
    }
    for segment in &segments {
        segment.dec_ref();
    }
    tsdb.tick(latest_ts);
}

/// Tears down a half-built accumulator: pooled batches go back, every
/// acquired segment reference is released.
fn discard(groups: &mut Groups) {
    for (_, group) in groups.drain() {
        for et in group.tables {
            ElementBatch::release(et.elements);
        }
        for segment in &group.segments {
            segment.dec_ref();
        }
    }
}

/// Packs a wire tag value into its column form. A null (or absent, or
/// type-mismatched) value yields the typed null of `tag_type`.
pub fn encode_tag_value(name: &str, tag_type: TagType, value: Option<&WireTagValue>) -> TagValue {
    match tag_type {
        TagType::Int => {
            let mut tag_value = TagValue::new(name, ValueType::Int64);
            if let Some(v) = value.and_then(WireTagValue::as_int) {
                tag_value.value = Some(Bytes::copy_from_slice(&tidemark_core::encode_i64(v)));
            }
            tag_value
        }
        TagType::Str => {
            let mut tag_value = TagValue::new(name, ValueType::Str);
            if let Some(s) = value.and_then(WireTagValue::as_str) {
                tag_value.value = Some(Bytes::copy_from_slice(s.as_bytes()));
            }
            tag_value
        }
        TagType::DataBinary => {
            let mut tag_value = TagValue::new(name, ValueType::BinaryData);
            if let Some(b) = value.and_then(WireTagValue::as_binary) {
                // Defensive copy: the wire buffer outlives this call, the
                // batch must not alias it.
                tag_value.value = Some(Bytes::copy_from_slice(b));
            }
            tag_value
        }
        TagType::IntArray => {
            let mut tag_value = TagValue::new(name, ValueType::Int64Arr);
            if let Some(arr) = value.and_then(WireTagValue::as_int_array) {
                tag_value.value_arr = Some(
                    arr.iter()
                        .map(|v| Bytes::copy_from_slice(&tidemark_core::encode_i64(*v)))
                        .collect(),
                );
            }
            tag_value
        }
        TagType::StrArray => {
            let mut tag_value = TagValue::new(name, ValueType::StrArr);
            if let Some(arr) = value.and_then(WireTagValue::as_str_array) {
                tag_value.value_arr = Some(
                    arr.iter()
                        .map(|s| Bytes::copy_from_slice(s.as_bytes()))
                        .collect(),
                );
            }
            tag_value
        }
    }
}

/// Projects a wire tag value into index fields. Arrays fan out into one
/// field per element; null values contribute nothing.
pub fn append_fields(
    dest: &mut Vec<Field>,
    key: FieldKey,
    tag_type: TagType,
    value: &WireTagValue,
    no_sort: bool,
) {
    match tag_type {
        TagType::Int => {
            if let Some(v) = value.as_int() {
                let mut field = Field::int(key, v);
                field.no_sort = no_sort;
                dest.push(field);
            }
        }
        TagType::Str => {
            if let Some(s) = value.as_str() {
                let mut field = Field::str(key, s);
                field.no_sort = no_sort;
                dest.push(field);
            }
        }
        TagType::DataBinary => {
            if let Some(b) = value.as_binary() {
                let mut field = Field::bytes(key, Bytes::copy_from_slice(b));
                field.no_sort = no_sort;
                dest.push(field);
            }
        }
        TagType::IntArray => {
            if let Some(arr) = value.as_int_array() {
                for v in arr {
                    let mut field = Field::int(key.clone(), *v);
                    field.no_sort = no_sort;
                    dest.push(field);
                }
            }
        }
        TagType::StrArray => {
            if let Some(arr) = value.as_str_array() {
                for s in arr {
                    let mut field = Field::str(key.clone(), s.clone());
                    field.no_sort = no_sort;
                    dest.push(field);
                }
            }
        }
    }
}
