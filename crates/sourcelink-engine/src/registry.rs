//! Handler registry.
//!
//! The application supplies two immutable tables at startup, one for
//! settings and one for commands, each mapping a message name to its
//! role-specific callbacks. The engine holds the tables by reference and
//! resolves names with a case-sensitive linear scan.
//!
//! Callbacks are plain `fn` pointers taking the application context by
//! reference, so the tables themselves can live in statics. `A` is the
//! application context type; `P` is the application-defined parameter type
//! handed through to outgoing command generators.

use serde_json::Value;

/// Callback for an incoming setting or setting-response payload.
pub type SettingCallback<A> = fn(&mut A, Option<&Value>);

/// Generator for the data field of an outgoing setting or setting response.
pub type SettingDataGenerator<A> = fn(&A) -> Value;

/// Callback for an incoming command; the returned value becomes the data
/// field of the command response, when one is owed.
pub type CommandCallback<A> = fn(&mut A, Option<&Value>) -> Option<Value>;

/// Generator for the data field of an outgoing command, built from the
/// caller-supplied parameter.
pub type CommandDataGenerator<A, P> = fn(&A, Option<&P>) -> Option<Value>;

/// Callback for an incoming command-response payload.
pub type CommandResponseCallback<A> = fn(&mut A, Option<&Value>);

/// One row of the setting table.
pub struct SettingEntry<A> {
    /// Setting name as it appears in the envelope.
    pub name: &'static str,
    /// Applies an incoming setting payload. `None` when this end never
    /// receives the setting.
    pub on_setting: Option<SettingCallback<A>>,
    /// Consumes an incoming setting response. `None` when this end never
    /// originates the setting with a correlation id.
    pub on_setting_response: Option<SettingCallback<A>>,
    /// Produces the data field for outgoing setting and setting-response
    /// messages. Required for any name this end transmits or answers.
    pub generate_data: Option<SettingDataGenerator<A>>,
}

/// One row of the command table.
pub struct CommandEntry<A, P> {
    /// Command name as it appears in the envelope.
    pub name: &'static str,
    /// Executes an incoming command and produces the response data, if any.
    pub on_command: Option<CommandCallback<A>>,
    /// Produces the data field for an outgoing command.
    pub generate_data: Option<CommandDataGenerator<A, P>>,
    /// Consumes an incoming command response.
    pub on_command_response: Option<CommandResponseCallback<A>>,
}

/// Read-only view over the application's two handler tables.
///
/// The tables outlive the engine; lookups hand back references with the
/// tables' lifetime, not the registry's.
pub struct HandlerRegistry<'h, A, P> {
    settings: &'h [SettingEntry<A>],
    commands: &'h [CommandEntry<A, P>],
}

impl<'h, A, P> HandlerRegistry<'h, A, P> {
    /// Wrap the application's tables.
    pub fn new(settings: &'h [SettingEntry<A>], commands: &'h [CommandEntry<A, P>]) -> Self {
        HandlerRegistry { settings, commands }
    }

    /// Resolve a setting name. First exact match wins; tables are expected
    /// to contain unique names.
    pub fn find_setting(&self, name: &str) -> Option<&'h SettingEntry<A>> {
        self.settings.iter().find(|entry| entry.name == name)
    }

    /// Resolve a command name.
    pub fn find_command(&self, name: &str) -> Option<&'h CommandEntry<A, P>> {
        self.commands.iter().find(|entry| entry.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx;

    fn noop(_ctx: &mut Ctx, _data: Option<&Value>) {}

    fn generate(_ctx: &Ctx) -> Value {
        Value::Null
    }

    const SETTINGS: &[SettingEntry<Ctx>] = &[
        SettingEntry {
            name: "Mode",
            on_setting: Some(noop),
            on_setting_response: None,
            generate_data: Some(generate),
        },
        SettingEntry {
            name: "Frequency",
            on_setting: Some(noop),
            on_setting_response: None,
            generate_data: None,
        },
    ];

    const COMMANDS: &[CommandEntry<Ctx, u32>] = &[CommandEntry {
        name: "Mode",
        on_command: None,
        generate_data: None,
        on_command_response: None,
    }];

    #[test]
    fn lookup_is_idempotent() {
        let registry = HandlerRegistry::new(SETTINGS, COMMANDS);
        let first = registry.find_setting("Frequency").unwrap();
        let second = registry.find_setting("Frequency").unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let registry = HandlerRegistry::new(SETTINGS, COMMANDS);
        assert!(registry.find_setting("Mode").is_some());
        assert!(registry.find_setting("mode").is_none());
    }

    #[test]
    fn unknown_name_is_none_not_an_error() {
        let registry = HandlerRegistry::new(SETTINGS, COMMANDS);
        assert!(registry.find_setting("Shape").is_none());
        assert!(registry.find_command("Shape").is_none());
    }

    #[test]
    fn setting_and_command_namespaces_are_independent() {
        let registry = HandlerRegistry::new(SETTINGS, COMMANDS);
        // "Mode" legally appears in both tables.
        assert!(registry.find_setting("Mode").is_some());
        assert!(registry.find_command("Mode").is_some());
    }
}
