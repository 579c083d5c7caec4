//! State mutations
//!
//! Each public method takes the write lock once, so an event is applied
//! atomically with respect to readers.

use cord_core::events::Ready;
use cord_core::{Channel, Emoji, Guild, Member, Message, Presence, Role, Status, VoiceState};
use std::collections::HashMap;
use tracing::trace;

use super::{GuildEntry, State, StateData};
use crate::error::{StateError, StateResult};

impl StateData {
    /// Insert or replace a guild, keeping what the payload leaves out
    ///
    /// An empty collection in the payload counts as "not sent". Roles, emojis,
    /// presences, voice states and the member count carry over only from a
    /// cached guild that was available; an unavailable stub has nothing worth
    /// keeping. Channels and members live in their own maps and always carry
    /// over.
    fn insert_guild(&mut self, mut guild: Guild) {
        guild.assign_ids();
        let guild_id = guild.id.clone();
        let channels = std::mem::take(&mut guild.channels);
        let members = std::mem::take(&mut guild.members);

        let previous = self.guilds.remove(&guild_id);
        let (mut channel_ids, mut member_ids) = match &previous {
            Some(entry) => (entry.channel_ids.clone(), entry.member_ids.clone()),
            None => {
                self.guild_order.push(guild_id.clone());
                (Vec::new(), Vec::new())
            }
        };

        if let Some(previous) = previous.filter(|p| !p.guild.unavailable) {
            let old = previous.guild;
            if guild.roles.is_empty() {
                guild.roles = old.roles;
            }
            if guild.emojis.is_empty() {
                guild.emojis = old.emojis;
            }
            if guild.presences.is_empty() {
                guild.presences = old.presences;
            }
            if guild.voice_states.is_empty() {
                guild.voice_states = old.voice_states;
            }
            if guild.member_count == 0 {
                guild.member_count = old.member_count;
            }
        }

        if !channels.is_empty() {
            for stale in channel_ids
                .iter()
                .filter(|id| !channels.iter().any(|c| &c.id == *id))
            {
                self.channels.remove(stale);
            }
            channel_ids = channels.iter().map(|c| c.id.clone()).collect();
            for channel in channels {
                self.upsert_channel(channel);
            }
        }

        if members.is_empty() {
            self.members.entry(guild_id.clone()).or_default();
        } else {
            // a repeated member keeps its first position and its last payload
            let mut map = HashMap::with_capacity(members.len());
            member_ids = Vec::with_capacity(members.len());
            for member in members {
                let user_id = member.user_id().to_string();
                if map.insert(user_id.clone(), member).is_none() {
                    member_ids.push(user_id);
                }
            }
            self.members.insert(guild_id.clone(), map);
        }

        self.guilds.insert(
            guild_id,
            GuildEntry {
                guild,
                channel_ids,
                member_ids,
            },
        );
    }

    /// Replace a cached channel in place, or insert a new one into the map
    ///
    /// Returns whether the channel was already cached.
    fn upsert_channel(&mut self, mut channel: Channel) -> bool {
        match self.channels.get_mut(&channel.id) {
            Some(existing) => {
                if channel.messages.is_empty() {
                    channel.messages = std::mem::take(&mut existing.messages);
                }
                if channel.permission_overwrites.is_empty() {
                    channel.permission_overwrites =
                        std::mem::take(&mut existing.permission_overwrites);
                }
                *existing = channel;
                true
            }
            None => {
                self.channels.insert(channel.id.clone(), channel);
                false
            }
        }
    }

    fn add_member(&mut self, member: Member) -> StateResult<()> {
        let guild_id = member.guild_id.clone();
        let user_id = member.user_id().to_string();

        let entry = self
            .guilds
            .get_mut(&guild_id)
            .ok_or_else(|| StateError::not_found("guild", &guild_id))?;
        let members = self.members.entry(guild_id).or_default();

        match members.get_mut(&user_id) {
            Some(existing) => {
                let joined_at = existing.joined_at;
                *existing = member;
                if existing.joined_at.is_none() {
                    existing.joined_at = joined_at;
                }
            }
            None => {
                members.insert(user_id.clone(), member);
                entry.member_ids.push(user_id);
            }
        }
        Ok(())
    }

    fn trim_messages(channel: &mut Channel, max: usize) {
        if channel.messages.len() > max {
            let overflow = channel.messages.len() - max;
            channel.messages.drain(..overflow);
        }
    }
}

impl State {
    /// Load the Ready payload
    ///
    /// With state disabled only the version, session id and user are kept.
    /// Otherwise the cache is rebuilt from the payload's guilds and private
    /// channels.
    pub fn on_ready(&self, ready: &Ready) -> StateResult<()> {
        let mut data = self.inner.write();

        let mut stored = ready.clone();
        stored.guilds = Vec::new();
        stored.private_channels = Vec::new();

        if !self.config.enabled {
            data.ready = Ready {
                version: ready.version,
                session_id: ready.session_id.clone(),
                user: ready.user.clone(),
                ..Ready::default()
            };
            return Ok(());
        }

        *data = StateData {
            ready: stored,
            ..StateData::default()
        };
        for guild in &ready.guilds {
            data.insert_guild(guild.clone());
        }
        for channel in &ready.private_channels {
            data.private_channel_ids.push(channel.id.clone());
            data.channels.insert(channel.id.clone(), channel.clone());
        }

        trace!(guilds = data.guilds.len(), "state loaded from ready");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Guilds
    // ------------------------------------------------------------------

    /// Add a guild, or update it keeping the collections the payload omits
    pub fn guild_add(&self, guild: Guild) -> StateResult<()> {
        self.inner.write().insert_guild(guild);
        Ok(())
    }

    /// Remove a guild along with its channels and members
    pub fn guild_remove(&self, guild_id: &str) -> StateResult<()> {
        let mut data = self.inner.write();
        let entry = data
            .guilds
            .remove(guild_id)
            .ok_or_else(|| StateError::not_found("guild", guild_id))?;

        data.guild_order.retain(|id| id != guild_id);
        for channel_id in &entry.channel_ids {
            data.channels.remove(channel_id);
        }
        data.members.remove(guild_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Presences
    // ------------------------------------------------------------------

    /// Add a presence, or merge it into the cached one
    pub fn presence_add(&self, guild_id: &str, presence: &Presence) -> StateResult<()> {
        let mut data = self.inner.write();
        let presences = &mut data.entry_mut(guild_id)?.guild.presences;

        match presences.iter_mut().find(|p| p.user.id == presence.user.id) {
            Some(existing) => existing.merge_update(presence),
            None => presences.push(presence.clone()),
        }
        Ok(())
    }

    pub fn presence_remove(&self, guild_id: &str, user_id: &str) -> StateResult<()> {
        let mut data = self.inner.write();
        let presences = &mut data.entry_mut(guild_id)?.guild.presences;

        let index = presences
            .iter()
            .position(|p| p.user.id == user_id)
            .ok_or_else(|| StateError::not_found("presence", user_id))?;
        presences.remove(index);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    /// Add a member, or replace it keeping `joined_at` if the payload omits it
    pub fn member_add(&self, member: Member) -> StateResult<()> {
        self.inner.write().add_member(member)
    }

    pub fn member_remove(&self, guild_id: &str, user_id: &str) -> StateResult<()> {
        let mut data = self.inner.write();
        data.entry(guild_id)?;

        data.members
            .get_mut(guild_id)
            .and_then(|members| members.remove(user_id))
            .ok_or_else(|| StateError::not_found("member", user_id))?;
        data.entry_mut(guild_id)?.member_ids.retain(|id| id != user_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Roles and emojis
    // ------------------------------------------------------------------

    /// Add a role, or replace the one with the same id
    pub fn role_add(&self, guild_id: &str, role: Role) -> StateResult<()> {
        let mut data = self.inner.write();
        let roles = &mut data.entry_mut(guild_id)?.guild.roles;

        match roles.iter_mut().find(|r| r.id == role.id) {
            Some(existing) => *existing = role,
            None => roles.push(role),
        }
        Ok(())
    }

    pub fn role_remove(&self, guild_id: &str, role_id: &str) -> StateResult<()> {
        let mut data = self.inner.write();
        let roles = &mut data.entry_mut(guild_id)?.guild.roles;

        let index = roles
            .iter()
            .position(|r| r.id == role_id)
            .ok_or_else(|| StateError::not_found("role", role_id))?;
        roles.remove(index);
        Ok(())
    }

    /// Add an emoji, or replace the one with the same id
    pub fn emoji_add(&self, guild_id: &str, emoji: Emoji) -> StateResult<()> {
        self.emojis_add(guild_id, vec![emoji])
    }

    pub fn emojis_add(&self, guild_id: &str, emojis: Vec<Emoji>) -> StateResult<()> {
        let mut data = self.inner.write();
        let cached = &mut data.entry_mut(guild_id)?.guild.emojis;

        for emoji in emojis {
            match cached.iter_mut().find(|e| e.id == emoji.id) {
                Some(existing) => *existing = emoji,
                None => cached.push(emoji),
            }
        }
        Ok(())
    }

    /// Replace a guild's whole emoji list
    pub fn emojis_replace(&self, guild_id: &str, emojis: Vec<Emoji>) -> StateResult<()> {
        self.inner.write().entry_mut(guild_id)?.guild.emojis = emojis;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    /// Add a channel, or replace it keeping cached messages and overwrites
    ///
    /// DM and group DM channels go to the private list; a new guild channel
    /// needs its guild in the cache.
    pub fn channel_add(&self, channel: Channel) -> StateResult<()> {
        let mut data = self.inner.write();

        if data.channels.contains_key(&channel.id) {
            data.upsert_channel(channel);
            return Ok(());
        }

        if channel.kind.is_private() {
            data.private_channel_ids.push(channel.id.clone());
        } else {
            let guild_id = channel.guild_id.as_deref().unwrap_or_default();
            data.entry_mut(guild_id)?.channel_ids.push(channel.id.clone());
        }

        data.upsert_channel(channel);
        Ok(())
    }

    pub fn channel_remove(&self, channel_id: &str) -> StateResult<()> {
        let mut data = self.inner.write();
        let channel = data.channel(channel_id)?;

        if channel.kind.is_private() {
            data.private_channel_ids.retain(|id| id != channel_id);
        } else {
            let guild_id = channel.guild_id.clone().unwrap_or_default();
            data.entry_mut(&guild_id)?.channel_ids.retain(|id| id != channel_id);
        }

        data.channels.remove(channel_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Merge into the cached message with the same id, or append
    ///
    /// Appending past `max_message_count` evicts the oldest messages.
    pub fn message_add(&self, message: Message) -> StateResult<()> {
        let max = self.config.max_message_count;
        let mut data = self.inner.write();
        let channel = data.channel_mut(&message.channel_id)?;

        if let Some(existing) = channel.messages.iter_mut().find(|m| m.id == message.id) {
            existing.merge_update(&message);
            return Ok(());
        }

        channel.messages.push(message);
        StateData::trim_messages(channel, max);
        Ok(())
    }

    pub fn message_remove(&self, message: &Message) -> StateResult<()> {
        self.message_remove_by_id(&message.channel_id, &message.id)
    }

    pub fn message_remove_by_id(&self, channel_id: &str, message_id: &str) -> StateResult<()> {
        let mut data = self.inner.write();
        let messages = &mut data.channel_mut(channel_id)?.messages;

        let index = messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| StateError::not_found("message", message_id))?;
        messages.remove(index);
        Ok(())
    }

    /// Drop every listed message that is cached
    pub fn messages_remove(&self, channel_id: &str, message_ids: &[String]) -> StateResult<()> {
        let mut data = self.inner.write();
        data.channel_mut(channel_id)?
            .messages
            .retain(|m| !message_ids.contains(&m.id));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Voice
    // ------------------------------------------------------------------

    /// Apply a voice state; an empty channel id means the user left
    pub fn voice_state_update(&self, update: &VoiceState) -> StateResult<()> {
        let mut data = self.inner.write();
        let states = &mut data.entry_mut(&update.guild_id)?.guild.voice_states;
        let position = states.iter().position(|v| v.user_id == update.user_id);

        match (update.is_leave(), position) {
            (true, Some(index)) => {
                states.remove(index);
            }
            (true, None) => {}
            (false, Some(index)) => states[index] = update.clone(),
            (false, None) => states.push(update.clone()),
        }
        Ok(())
    }

    /// Member side of a presence update
    ///
    /// Offline users are skipped. Otherwise the cached member gets the
    /// presence's nick, username and roles, or a member is created from it.
    pub(crate) fn member_from_presence(&self, guild_id: &str, presence: &Presence) -> StateResult<()> {
        if presence.status == Some(Status::Offline) {
            return Ok(());
        }

        let mut data = self.inner.write();
        let member = match data.member(guild_id, &presence.user.id) {
            Ok(cached) => {
                let mut member = cached.clone();
                if presence.nick.is_some() {
                    member.nick.clone_from(&presence.nick);
                }
                if !presence.user.username.is_empty() {
                    member.user.username.clone_from(&presence.user.username);
                }
                member.roles.clone_from(&presence.roles);
                member
            }
            Err(_) => Member {
                guild_id: guild_id.to_string(),
                nick: presence.nick.clone(),
                user: presence.user.clone(),
                roles: presence.roles.clone(),
                ..Member::default()
            },
        };
        data.add_member(member)
    }
}
