use kindler_core::domain::topic::TopicCategory;
use serde::Serialize;

/// Reactions suggested under every topic post.
pub const TOPIC_PROMPT_REACTIONS: [&str; 3] = ["thumbsup", "heart", "tada"];

/// Reacting with this emoji on a proposal asks the bot to schedule a meeting.
pub const MEETING_INVITE_REACTION: &str = "calendar";

pub const DATETIME_REPROMPT_TEXT: &str =
    "日時が認識できませんでした。「12/5 14:00」や「12月5日 14時」のような形式で教えてください。";

pub const NO_ATTENDEES_TEXT: &str = "参加者のメールアドレスが取得できませんでした。";

pub const MEETING_LOCATION: &str = "Google Meet（カレンダーをご確認ください）";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// A text-only message; the chat API receives no `blocks` payload.
    pub fn plain(text: impl Into<String>) -> Self {
        Self { fallback_text: text.into(), blocks: Vec::new() }
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section {
            block_id: block_id.into(),
            text: Some(builder.build()),
            fields: Vec::new(),
        });
        self
    }

    pub fn fields<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut FieldsBuilder),
    {
        let mut builder = FieldsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section {
            block_id: block_id.into(),
            text: None,
            fields: builder.build(),
        });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct FieldsBuilder {
    fields: Vec<TextObject>,
}

impl FieldsBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.fields
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

fn category_emoji(category: TopicCategory) -> &'static str {
    match category {
        TopicCategory::Casual => "📢",
        TopicCategory::Technical => "💻",
    }
}

pub fn topic_message(category: TopicCategory, content: &str) -> MessageTemplate {
    let reaction_hint = TOPIC_PROMPT_REACTIONS
        .iter()
        .map(|emoji| format!(":{emoji}:"))
        .collect::<Vec<_>>()
        .join(" ");

    MessageBuilder::new(content.to_owned())
        .section("topic.body.v1", |section| {
            section.mrkdwn(format!("{} {content}", category_emoji(category)));
        })
        .context("topic.reactions.v1", |context| {
            context.mrkdwn(format!("興味がある方はリアクションしてください！ {reaction_hint}"));
        })
        .build()
}

pub fn question_message(question_text: &str) -> MessageTemplate {
    MessageBuilder::new(question_text.to_owned())
        .section("question.body.v1", |section| {
            section.mrkdwn(question_text);
        })
        .context("question.reactions.v1", |context| {
            context.mrkdwn("他の方も興味があれば 👀 のリアクションをください！");
        })
        .build()
}

pub fn meeting_proposal_message(participant_count: usize) -> MessageTemplate {
    MessageBuilder::new(format!(
        "この話題、盛り上がってますね！（{participant_count}名が興味あり）"
    ))
    .section("proposal.body.v1", |section| {
        section.mrkdwn(format!(
            "🎉 この話題、盛り上がってますね！（{participant_count}名が興味あり）\n\
             もっと詳しく話したい方はいますか？\n\
             ミーティングを設定する場合は :{MEETING_INVITE_REACTION}: でリアクションしてください！"
        ));
    })
    .build()
}

pub fn calendar_created_message(
    event_title: &str,
    formatted_datetime: &str,
    location: &str,
    participants: &[String],
    calendar_url: &str,
) -> MessageTemplate {
    let mentions = participants
        .iter()
        .map(|name| {
            if name.starts_with("<@") && name.ends_with('>') {
                name.clone()
            } else {
                format!("<@{name}>")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    MessageBuilder::new("カレンダーにイベントを作成しました！".to_owned())
        .section("calendar.header.v1", |section| {
            section.mrkdwn("✅ *Googleカレンダーにイベントを作成しました！*");
        })
        .fields("calendar.details.v1", |fields| {
            fields
                .mrkdwn(format!("*📅 イベント*\n{event_title}"))
                .mrkdwn(format!("*🕒 日時*\n{formatted_datetime}"))
                .mrkdwn(format!("*📍 場所*\n{location}"))
                .mrkdwn(format!("*👥 参加者*\n{mentions} ({}名)", participants.len()));
        })
        .section("calendar.link.v1", |section| {
            section.mrkdwn(format!(
                "カレンダーの招待メールをご確認ください！\n<{calendar_url}|カレンダーで確認>"
            ));
        })
        .build()
}

pub fn error_message(summary: &str, details: Option<&str>) -> MessageTemplate {
    let mut builder =
        MessageBuilder::new("エラーが発生しました".to_owned()).section("error.body.v1", |section| {
            section.mrkdwn(format!("❌ *エラーが発生しました*\n{summary}"));
        });
    if let Some(details) = details {
        builder = builder.context("error.details.v1", |context| {
            context.mrkdwn(format!("詳細: {details}"));
        });
    }
    builder.build()
}
