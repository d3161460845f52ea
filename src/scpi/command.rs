use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Every command the server understands, keyed by its normalized long form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumString, EnumIter, IntoStaticStr)]
pub enum Command {
    #[strum(serialize = "*IDN?")]
    Identify,
    #[strum(serialize = "*RST")]
    Reset,
    #[strum(serialize = "*TST?")]
    SelfTest,
    #[strum(serialize = "SYSTEM:ERROR?")]
    SystemError,
    #[strum(serialize = "SYSTEM:VERSION?")]
    SystemVersion,

    #[strum(
        serialize = "SOURCE:VOLTAGE",
        serialize = "SOURCE:VOLTAGE:LEVEL:IMMEDIATE:AMPLITUDE",
        serialize = "VOLTAGE"
    )]
    SetVoltage,
    #[strum(serialize = "SOURCE:VOLTAGE?", serialize = "VOLTAGE?")]
    VoltageSetting,
    #[strum(
        serialize = "SOURCE:CURRENT",
        serialize = "SOURCE:CURRENT:LEVEL:IMMEDIATE:AMPLITUDE",
        serialize = "CURRENT"
    )]
    SetCurrent,
    #[strum(serialize = "SOURCE:CURRENT?", serialize = "CURRENT?")]
    CurrentSetting,

    #[strum(serialize = "MEASURE:VOLTAGE?")]
    MeasureVoltage,
    #[strum(serialize = "MEASURE:CURRENT?")]
    MeasureCurrent,
    #[strum(serialize = "MEASURE:POWER?")]
    MeasurePower,
    #[strum(serialize = "MEASURE:ALL?")]
    MeasureAll,

    #[strum(serialize = "OUTPUT", serialize = "OUTPUT:STATE")]
    SetOutput,
    #[strum(serialize = "OUTPUT?", serialize = "OUTPUT:STATE?")]
    OutputState,

    #[strum(serialize = "SOURCE:CURRENT:PROTECTION:STATE")]
    SetOcp,
    #[strum(serialize = "SOURCE:CURRENT:PROTECTION:STATE?")]
    OcpState,
    #[strum(serialize = "SOURCE:CURRENT:PROTECTION:TRIPPED?")]
    OcpTripped,

    #[strum(serialize = "STATUS:QUESTIONABLE:CONDITION?")]
    QuestionableCondition,
    #[strum(serialize = "STATUS:OPERATION:CONDITION?")]
    OperationCondition,
}

impl Command {
    /// Whether the command answers with a value rather than `OK`.
    pub fn is_query(self) -> bool {
        let name: &'static str = self.into();
        name.ends_with('?')
    }
}
