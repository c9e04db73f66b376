use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::NotificationError;
use crate::models::notification::{Channel, NotificationType};
use crate::models::template::{RenderedContent, Template, TemplateValidation};

/// A template body pre-split into literal runs and `{{variable}}` slots.
#[derive(Debug)]
enum Segment {
    Literal(String),
    Variable(String),
}

#[derive(Debug)]
struct CompiledTemplate {
    subject: Option<Vec<Segment>>,
    body: Vec<Segment>,
}

/// In-process registry of notification templates, keyed by id with a
/// (type, channel) resolution index. Compiled segment lists are memoized
/// per id; `save`/`delete` drop the memo entry.
pub struct TemplateRegistry {
    templates: RwLock<HashMap<String, Template>>,
    compiled: RwLock<HashMap<String, Arc<CompiledTemplate>>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            compiled: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for template in default_templates() {
            registry.save(template);
        }
        registry
    }

    /// Merges JSON template definitions from `dir` over the current set.
    /// Returns the number of templates loaded. Files that fail to parse are
    /// skipped with a warning.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, NotificationError> {
        let entries = fs::read_dir(dir)
            .map_err(|e| NotificationError::Store(format!("cannot read template dir: {}", e)))?;

        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable template file");
                    continue;
                }
            };

            match serde_json::from_str::<Template>(&raw) {
                Ok(template) => {
                    self.save(template);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping invalid template file");
                }
            }
        }

        info!(loaded, dir = %dir.display(), "Loaded template definitions");
        Ok(loaded)
    }

    pub fn get(&self, template_id: &str) -> Option<Template> {
        self.templates.read().unwrap().get(template_id).cloned()
    }

    /// Resolves the active template id for a (type, channel) pair.
    pub fn find(&self, kind: NotificationType, channel: Channel) -> Option<String> {
        let id = Template::id_for(kind, channel);
        let templates = self.templates.read().unwrap();
        match templates.get(&id) {
            Some(template) if template.is_active => Some(id),
            _ => None,
        }
    }

    pub fn save(&self, template: Template) {
        debug!(template_id = %template.id, "Saving template");
        self.compiled.write().unwrap().remove(&template.id);
        self.templates
            .write()
            .unwrap()
            .insert(template.id.clone(), template);
    }

    pub fn delete(&self, template_id: &str) -> bool {
        self.compiled.write().unwrap().remove(template_id);
        self.templates.write().unwrap().remove(template_id).is_some()
    }

    /// Renders a template against `data`. Every `{{key}}` occurrence is
    /// replaced with the stringified value; unresolved variables render as
    /// empty strings. Callers that need to reject incomplete data should run
    /// `validate` first.
    pub fn compile(
        &self,
        template_id: &str,
        data: &HashMap<String, JsonValue>,
    ) -> Result<RenderedContent, NotificationError> {
        let compiled = self.compiled_for(template_id)?;

        Ok(RenderedContent {
            subject: compiled
                .subject
                .as_ref()
                .map(|segments| render_segments(segments, data)),
            content: render_segments(&compiled.body, data),
        })
    }

    /// Checks `data` against the variables the template declares. Undeclared
    /// placeholders never count as missing.
    pub fn validate(
        &self,
        template_id: &str,
        data: &HashMap<String, JsonValue>,
    ) -> Result<TemplateValidation, NotificationError> {
        let template = self
            .get(template_id)
            .filter(|t| t.is_active)
            .ok_or_else(|| NotificationError::TemplateNotFound(template_id.to_string()))?;

        let missing_variables: Vec<String> = template
            .variables
            .iter()
            .filter(|name| !data.contains_key(*name))
            .cloned()
            .collect();

        Ok(TemplateValidation {
            is_valid: missing_variables.is_empty(),
            missing_variables,
        })
    }

    fn compiled_for(&self, template_id: &str) -> Result<Arc<CompiledTemplate>, NotificationError> {
        if let Some(compiled) = self.compiled.read().unwrap().get(template_id) {
            return Ok(compiled.clone());
        }

        let template = self
            .get(template_id)
            .filter(|t| t.is_active)
            .ok_or_else(|| NotificationError::TemplateNotFound(template_id.to_string()))?;

        let compiled = Arc::new(CompiledTemplate {
            subject: template.subject.as_deref().map(parse_segments),
            body: parse_segments(&template.body),
        });

        self.compiled
            .write()
            .unwrap()
            .insert(template_id.to_string(), compiled.clone());

        Ok(compiled)
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) if is_identifier(&after_open[..close]) => {
                literal.push_str(&rest[..open]);
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(after_open[..close].to_string()));
                rest = &after_open[close + 2..];
            }
            _ => {
                // Not a placeholder; keep the braces as literal text.
                literal.push_str(&rest[..open + 2]);
                rest = after_open;
            }
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    segments
}

fn render_segments(segments: &[Segment], data: &HashMap<String, JsonValue>) -> String {
    let mut output = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => output.push_str(text),
            Segment::Variable(name) => output.push_str(&stringify(data.get(name))),
        }
    }
    output
}

fn stringify(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(JsonValue::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

fn tpl(
    kind: NotificationType,
    channel: Channel,
    subject: Option<&str>,
    body: &str,
    variables: &[&str],
) -> Template {
    Template {
        id: Template::id_for(kind, channel),
        kind,
        channel,
        subject: subject.map(str::to_string),
        body: body.to_string(),
        variables: variables.iter().map(|v| v.to_string()).collect(),
        is_active: true,
    }
}

/// Built-in template set for the platform's notification flows. In-app
/// content intentionally has no templates; the raw title/message of the
/// request is what the inbox shows.
fn default_templates() -> Vec<Template> {
    use Channel::{Email, Push, Sms};
    use NotificationType::*;

    vec![
        tpl(
            PropertyInquiry,
            Email,
            Some("New inquiry for {{propertyTitle}}"),
            "Hi {{recipientName}},\n\nYou received a new inquiry for {{propertyTitle}} from {{senderName}}:\n\n{{inquiryMessage}}\n\nReply from your dashboard to follow up.",
            &["recipientName", "propertyTitle", "senderName", "inquiryMessage"],
        ),
        tpl(
            PropertyInquiry,
            Sms,
            None,
            "New inquiry for {{propertyTitle}} from {{senderName}}. Log in to reply.",
            &["propertyTitle", "senderName"],
        ),
        tpl(
            PropertyInquiry,
            Push,
            None,
            "{{senderName}} sent an inquiry about {{propertyTitle}}",
            &["senderName", "propertyTitle"],
        ),
        tpl(
            InquiryReply,
            Email,
            Some("Reply to your inquiry about {{propertyTitle}}"),
            "Hi {{recipientName}},\n\n{{senderName}} replied to your inquiry about {{propertyTitle}}:\n\n{{replyMessage}}",
            &["recipientName", "propertyTitle", "senderName", "replyMessage"],
        ),
        tpl(
            InquiryReply,
            Push,
            None,
            "{{senderName}} replied about {{propertyTitle}}",
            &["senderName", "propertyTitle"],
        ),
        tpl(
            PropertyApproved,
            Email,
            Some("Your listing {{propertyTitle}} is live"),
            "Hi {{recipientName}},\n\nYour listing {{propertyTitle}} was approved and is now visible to buyers.",
            &["recipientName", "propertyTitle"],
        ),
        tpl(
            PropertyRejected,
            Email,
            Some("Your listing {{propertyTitle}} needs changes"),
            "Hi {{recipientName}},\n\nYour listing {{propertyTitle}} could not be published:\n\n{{rejectionReason}}\n\nUpdate the listing and resubmit it for review.",
            &["recipientName", "propertyTitle", "rejectionReason"],
        ),
        tpl(
            FavoriteAdded,
            Email,
            Some("{{propertyTitle}} was added to favorites"),
            "Your listing {{propertyTitle}} was saved by a potential buyer.",
            &["propertyTitle"],
        ),
        tpl(
            FavoriteAdded,
            Push,
            None,
            "Someone favorited {{propertyTitle}}",
            &["propertyTitle"],
        ),
        tpl(
            PriceChanged,
            Email,
            Some("Price update for {{propertyTitle}}"),
            "The price of {{propertyTitle}} changed from {{oldPrice}} to {{newPrice}}.",
            &["propertyTitle", "oldPrice", "newPrice"],
        ),
        tpl(
            PriceChanged,
            Sms,
            None,
            "{{propertyTitle}}: price changed to {{newPrice}}.",
            &["propertyTitle", "newPrice"],
        ),
        tpl(
            PriceChanged,
            Push,
            None,
            "{{propertyTitle}} is now {{newPrice}}",
            &["propertyTitle", "newPrice"],
        ),
        tpl(
            ViewingScheduled,
            Email,
            Some("Viewing confirmed for {{propertyTitle}}"),
            "Hi {{recipientName}},\n\nYour viewing of {{propertyTitle}} is confirmed for {{viewingTime}}.\nAddress: {{propertyAddress}}",
            &["recipientName", "propertyTitle", "viewingTime", "propertyAddress"],
        ),
        tpl(
            ViewingScheduled,
            Sms,
            None,
            "Viewing confirmed: {{propertyTitle}} at {{viewingTime}}.",
            &["propertyTitle", "viewingTime"],
        ),
        tpl(
            ViewingScheduled,
            Push,
            None,
            "Viewing of {{propertyTitle}} at {{viewingTime}}",
            &["propertyTitle", "viewingTime"],
        ),
        tpl(
            SystemAlert,
            Email,
            Some("{{alertTitle}}"),
            "{{alertMessage}}",
            &["alertTitle", "alertMessage"],
        ),
        tpl(
            SystemAlert,
            Sms,
            None,
            "{{alertMessage}}",
            &["alertMessage"],
        ),
        tpl(
            Welcome,
            Email,
            Some("Welcome to the platform, {{recipientName}}"),
            "Hi {{recipientName}},\n\nYour account is ready. Browse listings, save favorites, and contact agents directly.",
            &["recipientName"],
        ),
    ]
}
