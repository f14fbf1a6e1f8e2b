//! Writer: input port 0 drained into a [`TargetWindow`].
//!
//! Records outside the writer's skip/limit window are read and dropped, so
//! the upstream component always sees its output consumed.

use crate::config::WriterSettings;
use crate::error::Result;
use crate::graph::node::{Component, NodeContext};
use crate::graph::nodes::missing_port;
use crate::graph::port::{Multiplicity, PortDescriptor};
use crate::graph::status::NodeStatus;
use crate::io::codec::RecordFormatter;
use crate::io::target::{Sink, TargetSettings, TargetWindow};
use crate::record::Record;
use std::sync::Arc;

static PORTS: &[PortDescriptor] = &[PortDescriptor::input("in", Multiplicity::One)];

pub struct Writer {
    name: String,
    window: TargetWindow,
}

impl Writer {
    /// Writer for the file pattern in `settings.target`.
    pub fn new(
        name: impl Into<String>,
        settings: &WriterSettings,
        formatter: Box<dyn RecordFormatter>,
    ) -> Result<Self> {
        let window = TargetWindow::files(&settings.target, TargetSettings::from(settings), formatter)?;
        Ok(Self {
            name: name.into(),
            window,
        })
    }

    /// Writer over explicit sinks. Such a writer can run only once.
    pub fn with_sinks(
        name: impl Into<String>,
        sinks: impl IntoIterator<Item = Sink>,
        settings: TargetSettings,
        formatter: Box<dyn RecordFormatter>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            window: TargetWindow::sinks(sinks, settings, formatter)?,
        })
    }

    /// Names of the outputs written by the last run.
    pub fn outputs(&self) -> &[String] {
        self.window.outputs()
    }
}

impl Component for Writer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "WRITER"
    }

    fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    fn execute(&mut self, ctx: &mut NodeContext) -> Result<NodeStatus> {
        let [input] = ctx.inputs_mut() else {
            return Err(missing_port(&self.name, "input 0"));
        };
        let mut record = Record::new(Arc::clone(input.schema()));
        while input.read_record(&mut record)? {
            self.window.write(&record)?;
        }
        self.window.finish()?;
        tracing::info!(
            "'{}' wrote {} records to {} outputs",
            self.name,
            self.window.written(),
            self.window.outputs().len()
        );
        Ok(NodeStatus::Ok)
    }

    fn reset(&mut self) -> Result<()> {
        self.window.restart()
    }
}
