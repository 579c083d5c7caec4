//! The state store
//!
//! Guilds are stored without their channel and member lists; those live in
//! the channel and member maps and are referenced by id, so a channel or
//! member has exactly one copy. Reads reassemble full entities.

mod events;
mod write;

use cord_common::StateConfig;
use cord_core::events::Ready;
use cord_core::{Channel, Emoji, Guild, Member, Message, Permissions, Presence, Role, User, VoiceState};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{StateError, StateResult};
use crate::permission::member_permissions;

#[derive(Debug, Default)]
struct GuildEntry {
    /// `channels` and `members` are always empty here
    guild: Guild,
    channel_ids: Vec<String>,
    member_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct StateData {
    /// Ready payload with its guild and channel lists moved into the maps
    ready: Ready,
    guilds: HashMap<String, GuildEntry>,
    guild_order: Vec<String>,
    channels: HashMap<String, Channel>,
    private_channel_ids: Vec<String>,
    members: HashMap<String, HashMap<String, Member>>,
}

impl StateData {
    fn entry(&self, guild_id: &str) -> StateResult<&GuildEntry> {
        self.guilds
            .get(guild_id)
            .ok_or_else(|| StateError::not_found("guild", guild_id))
    }

    fn entry_mut(&mut self, guild_id: &str) -> StateResult<&mut GuildEntry> {
        self.guilds
            .get_mut(guild_id)
            .ok_or_else(|| StateError::not_found("guild", guild_id))
    }

    fn channel(&self, channel_id: &str) -> StateResult<&Channel> {
        self.channels
            .get(channel_id)
            .ok_or_else(|| StateError::not_found("channel", channel_id))
    }

    fn channel_mut(&mut self, channel_id: &str) -> StateResult<&mut Channel> {
        self.channels
            .get_mut(channel_id)
            .ok_or_else(|| StateError::not_found("channel", channel_id))
    }

    fn member(&self, guild_id: &str, user_id: &str) -> StateResult<&Member> {
        self.members
            .get(guild_id)
            .and_then(|members| members.get(user_id))
            .ok_or_else(|| StateError::not_found("member", user_id))
    }

    fn assemble(&self, entry: &GuildEntry) -> Guild {
        let mut guild = entry.guild.clone();
        guild.channels = entry
            .channel_ids
            .iter()
            .filter_map(|id| self.channels.get(id))
            .cloned()
            .collect();
        if let Some(members) = self.members.get(&guild.id) {
            guild.members = entry
                .member_ids
                .iter()
                .filter_map(|id| members.get(id))
                .cloned()
                .collect();
        }
        guild
    }
}

/// Event-maintained cache of everything the session can see
#[derive(Debug)]
pub struct State {
    config: StateConfig,
    inner: RwLock<StateData>,
}

impl Default for State {
    fn default() -> Self {
        Self::new(StateConfig::default())
    }
}

impl State {
    pub fn new(config: StateConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(StateData::default()),
        }
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// The stored Ready payload, without guilds and private channels
    pub fn ready(&self) -> Ready {
        self.inner.read().ready.clone()
    }

    /// The user the session is logged in as
    pub fn user(&self) -> User {
        self.inner.read().ready.user.clone()
    }

    pub fn session_id(&self) -> String {
        self.inner.read().ready.session_id.clone()
    }

    // ------------------------------------------------------------------
    // Guilds
    // ------------------------------------------------------------------

    pub fn guild(&self, guild_id: &str) -> StateResult<Guild> {
        let data = self.inner.read();
        data.entry(guild_id).map(|entry| data.assemble(entry))
    }

    /// Every cached guild, in arrival order
    pub fn guilds(&self) -> Vec<Guild> {
        let data = self.inner.read();
        data.guild_order
            .iter()
            .filter_map(|id| data.guilds.get(id))
            .map(|entry| data.assemble(entry))
            .collect()
    }

    pub fn guild_count(&self) -> usize {
        self.inner.read().guilds.len()
    }

    pub fn member(&self, guild_id: &str, user_id: &str) -> StateResult<Member> {
        self.inner.read().member(guild_id, user_id).cloned()
    }

    pub fn role(&self, guild_id: &str, role_id: &str) -> StateResult<Role> {
        let data = self.inner.read();
        data.entry(guild_id)?
            .guild
            .role(role_id)
            .cloned()
            .ok_or_else(|| StateError::not_found("role", role_id))
    }

    pub fn emoji(&self, guild_id: &str, emoji_id: &str) -> StateResult<Emoji> {
        let data = self.inner.read();
        data.entry(guild_id)?
            .guild
            .emojis
            .iter()
            .find(|e| e.id == emoji_id)
            .cloned()
            .ok_or_else(|| StateError::not_found("emoji", emoji_id))
    }

    pub fn presence(&self, guild_id: &str, user_id: &str) -> StateResult<Presence> {
        let data = self.inner.read();
        data.entry(guild_id)?
            .guild
            .presences
            .iter()
            .find(|p| p.user.id == user_id)
            .cloned()
            .ok_or_else(|| StateError::not_found("presence", user_id))
    }

    pub fn voice_state(&self, guild_id: &str, user_id: &str) -> StateResult<VoiceState> {
        let data = self.inner.read();
        data.entry(guild_id)?
            .guild
            .voice_states
            .iter()
            .find(|v| v.user_id == user_id)
            .cloned()
            .ok_or_else(|| StateError::not_found("voice state", user_id))
    }

    // ------------------------------------------------------------------
    // Channels and messages
    // ------------------------------------------------------------------

    /// A guild or private channel, with its cached messages
    pub fn channel(&self, channel_id: &str) -> StateResult<Channel> {
        self.inner.read().channel(channel_id).cloned()
    }

    /// Same as [`channel`](Self::channel); the guild id is not consulted
    pub fn guild_channel(&self, _guild_id: &str, channel_id: &str) -> StateResult<Channel> {
        self.channel(channel_id)
    }

    /// Same as [`channel`](Self::channel)
    pub fn private_channel(&self, channel_id: &str) -> StateResult<Channel> {
        self.channel(channel_id)
    }

    pub fn private_channels(&self) -> Vec<Channel> {
        let data = self.inner.read();
        data.private_channel_ids
            .iter()
            .filter_map(|id| data.channels.get(id))
            .cloned()
            .collect()
    }

    pub fn message(&self, channel_id: &str, message_id: &str) -> StateResult<Message> {
        let data = self.inner.read();
        data.channel(channel_id)?
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or_else(|| StateError::not_found("message", message_id))
    }

    // ------------------------------------------------------------------
    // Derived
    // ------------------------------------------------------------------

    /// Effective permissions of a user in a guild channel
    pub fn user_channel_permissions(&self, user_id: &str, channel_id: &str) -> StateResult<Permissions> {
        let data = self.inner.read();
        let channel = data.channel(channel_id)?;
        let guild_id = channel.guild_id.as_deref().unwrap_or_default();
        let guild = &data.entry(guild_id)?.guild;

        if guild.is_owner(user_id) {
            return Ok(Permissions::ALL);
        }

        let member = data.member(&guild.id, user_id)?;
        Ok(member_permissions(guild, channel, member))
    }

    /// Display color of a user in a channel's guild
    ///
    /// Color of the highest positioned role that has one; 0 when none does
    /// or anything is missing from the cache.
    pub fn user_color(&self, user_id: &str, channel_id: &str) -> i32 {
        let data = self.inner.read();
        let Ok(channel) = data.channel(channel_id) else {
            return 0;
        };
        let Ok(entry) = data.entry(channel.guild_id.as_deref().unwrap_or_default()) else {
            return 0;
        };
        let Ok(member) = data.member(&entry.guild.id, user_id) else {
            return 0;
        };

        let mut roles: Vec<&Role> = entry
            .guild
            .roles
            .iter()
            .filter(|role| member.has_role(&role.id))
            .collect();
        roles.sort_by(|a, b| b.position.cmp(&a.position).then_with(|| a.id.cmp(&b.id)));

        roles
            .into_iter()
            .map(|role| role.color)
            .find(|color| *color != 0)
            .unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use cord_core::{Channel, Guild, Member, Message, Permissions, Role, User};

    pub const GUILD: &str = "100";
    pub const OWNER: &str = "1";
    pub const USER: &str = "2";

    pub fn guild() -> Guild {
        let mut guild = Guild::new(GUILD, "test guild", OWNER);
        guild.roles = vec![Role::new(GUILD, "@everyone", Permissions::VIEW_CHANNEL)];
        guild.channels = vec![
            Channel::guild("10", GUILD, "general"),
            Channel::guild("11", GUILD, "random"),
        ];
        guild.members = vec![
            Member::new(GUILD, User::new(OWNER, "owner")),
            Member::new(GUILD, User::new(USER, "someone")),
        ];
        guild
    }

    pub fn dm(id: &str) -> Channel {
        Channel::dm(id, User::new(USER, "someone"))
    }

    pub fn message(id: &str, channel_id: &str, content: &str) -> Message {
        Message::new(id, channel_id, content)
    }
}
