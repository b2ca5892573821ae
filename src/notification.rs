//! The dingtalk robot message built from an alertmanager payload.

use serde::{Deserialize, Serialize};

use crate::{
    alert::WebhookMessage,
    error::Result,
    template::{AlertRenderer, CONTENT, TITLE},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markdown {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// explicitly notified group members
pub struct At {
    pub at_mobiles: Vec<String>,
    pub is_at_all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// link to the graph of a firing alert
pub struct ActionButton {
    pub title: String,
    pub action_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// body of the request sent to the robot webhook
pub struct Notification {
    #[serde(rename = "msgtype")]
    pub message_type: MessageType,
    pub markdown: Markdown,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub at: Option<At>,

    /// Not sent: markdown messages have no action links. Kept so other
    /// message types or templates can pick them up.
    #[serde(skip)]
    pub buttons: Vec<ActionButton>,
}

impl Notification {
    /// Renders title and content and collects one button per firing alert.
    /// A render error aborts the build.
    pub fn build(renderer: &AlertRenderer, msg: &WebhookMessage) -> Result<Self> {
        let title = renderer.render(TITLE, msg)?;
        let text = renderer.render(CONTENT, msg)?;

        let buttons = msg
            .firing()
            .enumerate()
            .map(|(i, alert)| ActionButton {
                title: format!("Graph for alert #{}", i + 1),
                action_url: alert.generator_url.clone(),
            })
            .collect();

        Ok(Self {
            message_type: MessageType::Markdown,
            markdown: Markdown { title, text },
            at: None,
            buttons,
        })
    }

    /// Mentions every target of a comma separated list, e.g. `186xxxx,187xxxx`.
    ///
    /// Targets are neither trimmed nor validated, empty segments are kept.
    /// Calling this twice mentions everybody twice.
    pub fn inject_mentions(&mut self, targets: &str) {
        if targets.is_empty() {
            return;
        }

        let at = self.at.get_or_insert_with(At::default);

        for target in targets.split(',') {
            at.at_mobiles.push(target.to_owned());
            self.markdown.text.push('@');
            self.markdown.text.push_str(target);
        }

        at.is_at_all = false;
    }
}
