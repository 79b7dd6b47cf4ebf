//! Request context and lifecycle
//!
//! A [`RequestContext`] carries everything commands need while a request
//! runs: the context binding table and, optionally, the store connection
//! shared with the table's document providers. [`Request::execute`] runs a
//! command list and then either closes every provider and commits, or
//! aborts every provider and rolls back.

use crate::command::CommandList;
use crate::flow::ControlFlow;
use crate::runner::CommandRunner;
use std::sync::Arc;
use tracing::{debug, warn};
use workdoc_context::labels::{self, ATTACH};
use workdoc_context::{ContextTable, EmptyDocumentProvider, PathContext};
use workdoc_core::{NodeRef, Result, TreeRef};
use workdoc_storage::SharedConnection;

/// State shared by the commands of one request
pub struct RequestContext {
    table: ContextTable,
    connection: Option<SharedConnection>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Context with scratch `sys`, `temp`, `return` and `error` documents
    pub fn new() -> Self {
        Self::with_table(ContextTable::new())
    }

    /// Context around an existing table
    ///
    /// Scratch providers are registered for `sys`, `temp`, `return` and
    /// `error` unless the table already knows those labels.
    pub fn with_table(mut table: ContextTable) -> Self {
        for (label, root) in [
            (labels::SYS, "SYS"),
            (labels::TEMP, "TEMP"),
            (labels::RETURN, "RETURN"),
            (labels::ERROR, "ERROR"),
        ] {
            if !table.exists(label) {
                table.register_provider(label, Arc::new(EmptyDocumentProvider::new(root)));
            }
        }
        RequestContext {
            table,
            connection: None,
        }
    }

    /// Builder: store connection committed or rolled back with the request
    pub fn with_connection(mut self, connection: SharedConnection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Store connection, if any
    pub fn connection(&self) -> Option<&SharedConnection> {
        self.connection.as_ref()
    }

    /// Binding table
    pub fn table(&self) -> &ContextTable {
        &self.table
    }

    /// Binding table, mutably
    pub fn table_mut(&mut self) -> &mut ContextTable {
        &mut self.table
    }

    /// Bind `tree` as the `root` document and point `attach` at its root
    pub fn bind_root(&mut self, tree: TreeRef) -> NodeRef {
        let root = self.table.bind_document(labels::ROOT, tree);
        self.table.bind(ATTACH, root.clone(), Some(labels::ROOT));
        root
    }

    /// Set the text of `path` below the `sys` document, creating it if needed
    pub fn add_sys_info(&mut self, path: &str, value: &str) -> Result<()> {
        let query = format!(":{{{}}}/{}", labels::SYS, path);
        let node = self.table.resolve_one(&query, PathContext::Default, true)?;
        let mut tree = node.tree().write();
        tree.set_text(node.node(), value)
    }

    /// Text stored at `path` below the `sys` document (`""` if absent)
    pub fn sys_info(&mut self, path: &str) -> Result<String> {
        let query = format!(":{{{}}}/{}", labels::SYS, path);
        self.table.resolve_string(&query, PathContext::Default)
    }

    /// Text of a literal or `string(query)` expression
    pub fn evaluate_string(&mut self, expr: &str) -> Result<String> {
        match expr
            .trim()
            .strip_prefix("string(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            Some(query) => self.table.resolve_string(query.trim(), PathContext::Default),
            None => Ok(expr.to_string()),
        }
    }
}

/// One request: a context plus its lifecycle
pub struct Request {
    context: RequestContext,
}

impl Request {
    /// Wrap a context
    pub fn new(context: RequestContext) -> Self {
        Request { context }
    }

    /// Request context
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Request context, mutably
    pub fn context_mut(&mut self) -> &mut RequestContext {
        &mut self.context
    }

    /// Run `commands`, then settle every touched document
    ///
    /// On success providers are closed (writing modified documents) and
    /// the connection committed. On a fatal error, or a thrown code nobody
    /// caught, providers are aborted and the connection rolled back. An
    /// uncaught thrown code is still returned as the request's signal.
    pub fn execute(&mut self, commands: &CommandList) -> Result<ControlFlow> {
        let mut runner = CommandRunner::new();
        match runner.run_commands(&mut self.context, commands) {
            Ok(flow @ ControlFlow::Thrown { .. }) => {
                warn!(target: "workdoc::executor", signal = %flow, "uncaught code, aborting request");
                self.fail();
                Ok(flow)
            }
            Ok(flow) => match self.complete() {
                Ok(()) => Ok(flow),
                Err(e) => {
                    self.fail();
                    Err(e)
                }
            },
            Err(e) => {
                warn!(target: "workdoc::executor", error = %e, "request failed, aborting");
                self.fail();
                Err(e)
            }
        }
    }

    fn complete(&mut self) -> Result<()> {
        self.context.table.close_providers()?;
        if let Some(conn) = &self.context.connection {
            conn.lock().commit()?;
        }
        debug!(target: "workdoc::executor", "request completed");
        Ok(())
    }

    fn fail(&mut self) {
        self.context.table.abort_providers();
        if let Some(conn) = &self.context.connection {
            if let Err(e) = conn.lock().rollback() {
                warn!(target: "workdoc::executor", error = %e, "rollback failed");
            }
        }
    }
}
