pub mod video_dto;

pub use video_dto::{
    ArchiveResponseDto, BlobNameDto, DeleteVideoResponseDto, ListVideosQuery,
    OverwriteResponseDto, TemporaryAccessDto, VideoMetadataDto, VideoMetadataQuery,
    VideoResponseDto,
};
