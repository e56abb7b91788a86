// Host traits over sway IPC: containers as views, hidden marks as markers.
use log::debug;
use swayipc::{Connection, EventStream, EventType, Node, NodeType};

use crate::error::{Error, Result};
use crate::listener::Subscription;
use crate::marker::{MarkerHost, SuppressionMarker};
use crate::view::{ViewId, ViewInfo, ViewLayer, ViewRole, ViewSource};

/// Output sway uses to hold the scratchpad.
const INTERNAL_OUTPUT: &str = "__i3";

/// A sway session seen through the command socket.
///
/// The connection is opened on first use and reused afterwards.
#[derive(Default)]
pub struct SwayHost {
    conn: Option<Connection>,
}

impl std::fmt::Debug for SwayHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwayHost")
            .field("connected", &self.conn.is_some())
            .finish()
    }
}

impl SwayHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the command connection up front so startup fails early.
    pub fn connect() -> Result<Self> {
        Ok(Self {
            conn: Some(Connection::new()?),
        })
    }

    fn conn(&mut self) -> Result<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => Connection::new()?,
        };
        Ok(self.conn.insert(conn))
    }

    fn run(&mut self, command: String) -> Result<()> {
        debug!("sway: {command}");
        let outcomes = self.conn()?.run_command(&command)?;
        for outcome in outcomes {
            if let Err(err) = outcome {
                return Err(Error::Command {
                    command,
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }

    fn find_node(&mut self, view: ViewId) -> Result<Option<Node>> {
        let tree = self.conn()?.get_tree()?;
        Ok(find_con(&tree, view.0).cloned())
    }
}

/// Subscribe to the sway events backing `subscriptions`.
pub fn subscribe_events(
    subscriptions: impl IntoIterator<Item = Subscription>,
) -> Result<EventStream> {
    let types = event_types(subscriptions);
    Ok(Connection::new()?.subscribe(types)?)
}

fn event_types(subscriptions: impl IntoIterator<Item = Subscription>) -> Vec<EventType> {
    let mut window = false;
    let mut binding = false;
    for subscription in subscriptions {
        match subscription {
            Subscription::ViewMapped | Subscription::ViewUnmapped => window = true,
            Subscription::Key | Subscription::PointerButton => binding = true,
            // sway grants focus without asking anyone.
            Subscription::FocusRequest => {}
        }
    }

    let mut types = Vec::new();
    if window {
        types.push(EventType::Window);
    }
    // Commands arrive as bindings too.
    if binding || window {
        types.push(EventType::Binding);
    }
    types
}

impl ViewSource for SwayHost {
    fn views(&mut self) -> Result<Vec<ViewInfo>> {
        let tree = self.conn()?.get_tree()?;
        let mut views = Vec::new();
        collect_views(&tree, &mut views);
        Ok(views)
    }

    fn active_view(&mut self) -> Result<Option<ViewInfo>> {
        let tree = self.conn()?.get_tree()?;
        Ok(tree
            .find_as_ref(|node| node.focused)
            .and_then(view_info))
    }

    fn focus_view(&mut self, view: ViewId) -> Result<()> {
        self.run(format!("[con_id={}] focus", view.0))
    }

    fn refocus(&mut self) -> Result<()> {
        self.run("focus tiling".to_string())
    }
}

impl MarkerHost for SwayHost {
    fn attach_marker(&mut self, view: ViewId, marker: SuppressionMarker) -> Result<()> {
        self.run(format!(
            "[con_id={}] mark --add \"{}\"",
            view.0,
            mark_name(&marker)
        ))
    }

    fn detach_marker(&mut self, view: ViewId, name: &str) -> Result<()> {
        let Some(node) = self.find_node(view)? else {
            return Ok(());
        };
        let stale: Vec<String> = node
            .marks
            .iter()
            .filter(|mark| parse_mark(mark, name, view).is_some())
            .cloned()
            .collect();
        for mark in stale {
            self.run(format!("unmark \"{mark}\""))?;
        }
        Ok(())
    }

    fn marker(&mut self, view: ViewId, name: &str) -> Result<Option<SuppressionMarker>> {
        let Some(node) = self.find_node(view)? else {
            return Ok(None);
        };
        let Some(marker_name) = known_marker_name(name) else {
            return Ok(None);
        };
        Ok(node
            .marks
            .iter()
            .find_map(|mark| parse_mark(mark, name, view))
            .map(|serial| SuppressionMarker::new(view, marker_name, serial)))
    }

    fn markers(&mut self, name: &str) -> Result<Vec<SuppressionMarker>> {
        let Some(marker_name) = known_marker_name(name) else {
            return Ok(Vec::new());
        };
        let tree = self.conn()?.get_tree()?;
        let mut found = Vec::new();
        collect_markers(&tree, marker_name, &mut found);
        Ok(found)
    }

    /// Marks name their view, so one `unmark` batch clears them all.
    fn detach_markers(&mut self, markers: &[SuppressionMarker]) -> Result<()> {
        match unmark_command(markers) {
            Some(command) => self.run(command),
            None => Ok(()),
        }
    }
}

/// `unmark` commands for `markers`, joined into one sway command list.
pub fn unmark_command(markers: &[SuppressionMarker]) -> Option<String> {
    if markers.is_empty() {
        return None;
    }
    let commands: Vec<String> = markers
        .iter()
        .map(|marker| format!("unmark \"{}\"", mark_name(marker)))
        .collect();
    Some(commands.join("; "))
}

// Markers carry a `'static` name; only the crate's own names round-trip.
fn known_marker_name(name: &str) -> Option<&'static str> {
    (name == crate::marker::SUPPRESSION_MARKER).then_some(crate::marker::SUPPRESSION_MARKER)
}

/// sway marks are global, so the view id goes into the mark itself. The
/// leading underscore keeps it out of title bars.
pub fn mark_name(marker: &SuppressionMarker) -> String {
    format!("_{}:{}:{}", marker.name(), marker.view().0, marker.serial())
}

/// View and serial encoded in a mark produced by [`mark_name`] for `name`.
pub fn parse_any_mark(mark: &str, name: &str) -> Option<(ViewId, u64)> {
    let rest = mark.strip_prefix('_')?.strip_prefix(name)?.strip_prefix(':')?;
    let (id, serial) = rest.split_once(':')?;
    Some((ViewId(id.parse().ok()?), serial.parse().ok()?))
}

/// Serial of a mark produced by [`mark_name`] for `name` on `view`.
pub fn parse_mark(mark: &str, name: &str, view: ViewId) -> Option<u64> {
    parse_any_mark(mark, name)
        .filter(|(marked, _)| *marked == view)
        .map(|(_, serial)| serial)
}

/// Role and layer for a window container, `None` for structural nodes.
pub fn classify(node_type: &NodeType) -> Option<(ViewRole, ViewLayer)> {
    match node_type {
        NodeType::Con => Some((ViewRole::Toplevel, ViewLayer::Workspace)),
        NodeType::FloatingCon => Some((ViewRole::Overlay, ViewLayer::Floating)),
        _ => None,
    }
}

fn is_window(node: &Node) -> bool {
    node.nodes.is_empty()
        && node.floating_nodes.is_empty()
        && (node.app_id.is_some() || node.window.is_some())
}

/// Snapshot of a window container.
pub fn view_info(node: &Node) -> Option<ViewInfo> {
    if !is_window(node) {
        return None;
    }
    let (role, layer) = classify(&node.node_type)?;
    let mut info = ViewInfo::new(node.id, role, layer);
    let app_id = node.app_id.clone().or_else(|| {
        node.window_properties
            .as_ref()
            .and_then(|props| props.class.clone())
    });
    info.app_id = app_id;
    info.title = node.name.clone();
    Some(info)
}

fn collect_views(node: &Node, out: &mut Vec<ViewInfo>) {
    let internal = node.name.as_deref() == Some(INTERNAL_OUTPUT);
    if internal && matches!(node.node_type, NodeType::Output) {
        return;
    }
    if let Some(info) = view_info(node) {
        out.push(info);
        return;
    }
    // Tiled children first so floating windows sit above them.
    for child in node.nodes.iter().chain(node.floating_nodes.iter()) {
        collect_views(child, out);
    }
}

// A mark only counts on the container it names.
fn collect_markers(node: &Node, name: &'static str, out: &mut Vec<SuppressionMarker>) {
    for mark in &node.marks {
        if let Some((view, serial)) = parse_any_mark(mark, name)
            && view.0 == node.id
        {
            out.push(SuppressionMarker::new(view, name, serial));
        }
    }
    for child in node.nodes.iter().chain(node.floating_nodes.iter()) {
        collect_markers(child, name, out);
    }
}

fn find_con(node: &Node, id: i64) -> Option<&Node> {
    if node.id == id {
        return Some(node);
    }
    node.nodes
        .iter()
        .chain(node.floating_nodes.iter())
        .find_map(|child| find_con(child, id))
}
