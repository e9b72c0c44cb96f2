/// ITU-T T.35 identifiers and mapping defaults shared by the mapper, the
/// encoder and the decoder.
///
/// The values registered for HDR10+ are the [`Default`]. A config is plain
/// immutable data: build it once and hand it around by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataConfig {
    pub itu_t_t35_country_code: u8,
    pub itu_t_t35_terminal_provider_code: u16,
    pub itu_t_t35_terminal_provider_oriented_code: u16,
    pub application_identifier: u8,
    /// Used when a frame does not carry `ApplicationVersion`.
    pub default_application_version: u8,
    /// Used when a frame does not carry `TargetedSystemDisplayMaximumLuminance`.
    pub default_targeted_system_display_maximum_luminance: u32,
    /// Upper bound for the encoded metadata body, country code excluded.
    pub max_payload_bytes: usize,
}

pub const ITU_T_T35_COUNTRY_CODE_USA: u8 = 0xB5;
pub const ITU_T_T35_PROVIDER_SAMSUNG: u16 = 0x003C;
pub const ITU_T_T35_PROVIDER_ORIENTED_HDR10PLUS: u16 = 0x0001;
pub const APPLICATION_IDENTIFIER_ST2094_40: u8 = 4;

pub const DEFAULT_CONFIG: MetadataConfig = MetadataConfig {
    itu_t_t35_country_code: ITU_T_T35_COUNTRY_CODE_USA,
    itu_t_t35_terminal_provider_code: ITU_T_T35_PROVIDER_SAMSUNG,
    itu_t_t35_terminal_provider_oriented_code: ITU_T_T35_PROVIDER_ORIENTED_HDR10PLUS,
    application_identifier: APPLICATION_IDENTIFIER_ST2094_40,
    default_application_version: 1,
    default_targeted_system_display_maximum_luminance: 0,
    max_payload_bytes: 1024,
};

impl Default for MetadataConfig {
    fn default() -> Self {
        DEFAULT_CONFIG
    }
}

impl MetadataConfig {
    pub fn max_payload_bits(&self) -> usize {
        self.max_payload_bytes * 8
    }
}
