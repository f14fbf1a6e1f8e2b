//! Reader: a [`SourceWindow`] feeding output port 0.
//!
//! Sources come either from `ReaderSettings::source` or, in port-fed mode,
//! from the records arriving on the optional input port: each record
//! contributes the content of one string or bytes field, either as the data
//! of a source (`discrete`) or as a source list (`source`).
//!
//! Under [`FaultPolicy::Controlled`] rejected records are described on the
//! optional error port 1, whose layout is [`Reader::error_schema`].

use crate::config::{PortSourceMode, ReaderSettings};
use crate::error::{FlowError, Result};
use crate::graph::edge::OutputPort;
use crate::graph::node::{Component, InitContext, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;
use crate::graph::stop::StopSignal;
use crate::io::codec::RecordParser;
use crate::io::policy::FaultPolicy;
use crate::io::source::{SourceSpec, SourceWindow, WindowSettings};
use crate::record::{FieldDef, FieldType, Record, Schema, Value};
use std::sync::Arc;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("sources", Multiplicity::Optional),
    PortDescriptor::output("out", Multiplicity::One),
    PortDescriptor::output("error", Multiplicity::Optional),
];

pub struct Reader {
    name: String,
    settings: ReaderSettings,
    parser: Option<Box<dyn RecordParser>>,
    window_settings: WindowSettings,
    port_field: Option<usize>,
    error_schema: Option<Arc<Schema>>,
}

impl Reader {
    pub fn new(
        name: impl Into<String>,
        settings: ReaderSettings,
        parser: Box<dyn RecordParser>,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            parser: Some(parser),
            window_settings: WindowSettings::default(),
            port_field: None,
            error_schema: None,
        }
    }

    /// Layout of the records written to the error port.
    pub fn error_schema() -> Result<Arc<Schema>> {
        let fields = vec![
            FieldDef::new("record_number", FieldType::Long).not_null(),
            FieldDef::new("source", FieldType::String),
            FieldDef::new("message", FieldType::String),
        ];
        Ok(Arc::new(Schema::new("reader_error", fields)?))
    }

    fn pump(
        &self,
        window: &mut SourceWindow,
        record: &mut Record,
        out: &mut OutputPort,
        mut errors: Option<&mut OutputPort>,
        stop: &StopSignal,
    ) -> Result<()> {
        let mut error_record = self.error_schema.as_ref().map(|s| Record::new(Arc::clone(s)));
        loop {
            if !stop.is_running() {
                return Err(FlowError::Aborted);
            }
            let more = window.next(record)?;
            for failure in window.take_failures() {
                if let (Some(port), Some(error_record)) = (errors.as_deref_mut(), error_record.as_mut()) {
                    error_record.set(0, failure.record_number as i64)?;
                    error_record.set(1, failure.source)?;
                    error_record.set(2, failure.message)?;
                    port.write_record(error_record)?;
                }
            }
            if !more {
                return Ok(());
            }
            out.write_record(record)?;
        }
    }

    fn execute_window(&self, window: &mut SourceWindow, ctx: &mut NodeContext) -> Result<()> {
        let stop = ctx.stop_signal().clone();
        let (inputs, outputs) = ctx.ports_mut();
        let (out, errors) = match outputs {
            [out] => (out, None),
            [out, errors] => (out, Some(errors)),
            _ => return Err(missing_port(&self.name, "output 0")),
        };
        let mut record = Record::new(Arc::clone(out.schema()));

        let Some(field) = self.port_field else {
            window.add_spec(&self.settings.source)?;
            return self.pump(window, &mut record, out, errors, &stop);
        };

        let mode = self
            .settings
            .port_source
            .as_ref()
            .map(|p| p.mode)
            .unwrap_or_default();
        let [input] = inputs else {
            return Err(missing_port(&self.name, "input 0"));
        };
        let mut errors = errors;
        let mut request = Record::new(Arc::clone(input.schema()));
        let mut received = 0u64;

        while input.read_record(&mut request)? {
            received += 1;
            if window.is_limit_reached() {
                continue;
            }
            match (mode, request.get(field)) {
                (_, None | Some(Value::Null)) => continue,
                (PortSourceMode::Discrete, Some(Value::String(s))) => window.add_source(
                    SourceSpec::memory(format!("{}:port#{}", self.name, received), s.clone().into_bytes()),
                ),
                (PortSourceMode::Discrete, Some(Value::Bytes(b))) => window.add_source(
                    SourceSpec::memory(format!("{}:port#{}", self.name, received), b.clone()),
                ),
                (PortSourceMode::Source, Some(Value::String(s))) => window.add_spec(s)?,
                (_, Some(other)) => {
                    return Err(FlowError::TypeMismatch {
                        field: self.settings.port_source.as_ref().map(|p| p.field.clone()).unwrap_or_default(),
                        expected: "string or bytes".to_string(),
                        found: other.type_name().to_string(),
                    })
                }
            }
            self.pump(window, &mut record, out, errors.as_deref_mut(), &stop)?;
        }
        Ok(())
    }
}

impl Component for Reader {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "READER"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.window_settings =
            WindowSettings::from_reader(&self.settings, ctx.config.runtime.fault_policy);

        let error_schema = Self::error_schema()?;
        if let Some(errors) = ctx.output_schemas.get(1) {
            if !errors.is_compatible(&error_schema) {
                return Err(FlowError::Configuration(format!(
                    "'{}': error port must use the reader error layout (record_number, source, message)",
                    self.name
                )));
            }
            if self.window_settings.policy != FaultPolicy::Controlled {
                tracing::warn!(
                    "'{}': error port connected but fault policy is {}",
                    self.name,
                    self.window_settings.policy
                );
            }
        }
        self.error_schema = Some(error_schema);

        match (&self.settings.port_source, ctx.input_schemas.first()) {
            (Some(port), Some(schema)) => {
                let index = schema.require_index(&port.field)?;
                self.port_field = Some(index);
            }
            (Some(_), None) => {
                return Err(FlowError::Configuration(format!(
                    "'{}': port-fed reading needs a connected input port",
                    self.name
                )))
            }
            (None, Some(_)) => {
                return Err(FlowError::Configuration(format!(
                    "'{}': input port is connected but no port_source field is set",
                    self.name
                )))
            }
            (None, None) if self.settings.source.trim().is_empty() => {
                return Err(FlowError::Configuration(format!(
                    "'{}': no source given",
                    self.name
                )))
            }
            (None, None) => self.port_field = None,
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        let parser = self.parser.take().ok_or_else(|| {
            FlowError::Configuration(format!("'{}': parser lost in an earlier run", self.name))
        })?;
        let mut window = SourceWindow::new(parser, self.window_settings);

        let result = self.execute_window(&mut window, ctx);
        let closed = window.close();
        tracing::info!(
            "'{}' read {} records from {} sources",
            self.name,
            window.returned(),
            window.sources_opened()
        );
        self.parser = Some(window.into_parser());

        result?;
        closed?;
        Ok(NodeStatus::Ok)
    }
}
