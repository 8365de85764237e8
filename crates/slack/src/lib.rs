//! Slack Integration - Events API bot interface
//!
//! This crate provides the Slack surface for kindler:
//! - **Events** (`events`) - Envelope parsing and handler dispatch for
//!   `reaction_added` and thread `message` callbacks
//! - **Block Kit** (`blocks`) - Message builders for topic posts, meeting
//!   proposals, and calendar confirmations
//! - **Gateway** (`gateway`) - Web API client for posting messages and
//!   looking up workspace members
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Subscribe to `reaction_added` and `message.channels` events
//! 3. Point the event subscription at `POST /slack/events`
//! 4. Set `KINDLER_SLACK_BOT_TOKEN` to the bot token

pub mod blocks;
pub mod events;
pub mod gateway;
