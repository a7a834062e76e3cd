pub mod header;
pub mod icons;
pub mod map_embed;
pub mod sections;
pub mod status_card;
