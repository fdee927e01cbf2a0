pub mod core {
    pub mod category;
    pub mod identifiers;
}

pub mod events;

pub mod execution {
    pub mod checkpoint;
    pub mod classification;
    pub mod job;
    pub mod outcome;
    pub mod routing;
}

pub mod records {
    pub mod sheet;
}

pub mod transform {
    pub mod rules;
}
